//! Tag entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Classification bucket for a tag: applied use-case, research method, or
/// manually added by a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum TagKind {
    #[sea_orm(string_value = "Industrial")]
    Industrial,
    #[sea_orm(string_value = "Academic")]
    Academic,
    #[sea_orm(string_value = "UserDefined")]
    UserDefined,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Globally unique, case-sensitive as stored.
    #[sea_orm(column_type = "Text", unique)]
    pub name: String,

    pub kind: TagKind,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::paper_tag::Entity")]
    PaperTags,
}

impl Related<super::paper_tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaperTags.def()
    }
}

impl Related<super::paper::Entity> for Entity {
    fn to() -> RelationDef {
        super::paper_tag::Relation::Paper.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::paper_tag::Relation::Tag.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
