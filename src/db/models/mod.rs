//! SeaORM entity models

pub mod paper;
pub mod paper_tag;
pub mod source;
pub mod tag;

pub use paper::{
    ActiveModel as PaperActiveModel, Column as PaperColumn, Entity as PaperEntity, Model as Paper,
};

pub use tag::{
    ActiveModel as TagActiveModel, Column as TagColumn, Entity as TagEntity, Model as Tag, TagKind,
};

pub use paper_tag::{
    ActiveModel as PaperTagActiveModel, Column as PaperTagColumn, Entity as PaperTagEntity,
    Model as PaperTag,
};

pub use source::{
    ActiveModel as SourceActiveModel, Column as SourceColumn, Entity as SourceEntity,
    Model as Source,
};
