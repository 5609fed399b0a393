//! SeaORM/Postgres implementation of the `Store` contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use std::time::Duration;
use uuid::Uuid;

use super::models::{
    Paper, PaperActiveModel, PaperColumn, PaperEntity, PaperTagActiveModel, PaperTagColumn,
    PaperTagEntity, Source, SourceColumn, SourceEntity, Tag, TagActiveModel, TagColumn, TagEntity,
    TagKind,
};
use super::{NewPaper, PaperQuery, PaperWithTags, Store};
use crate::config::DatabaseConfig;
use crate::errors::AppError;

#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Escape LIKE metacharacters so a search token always matches literally
/// ("100%" must not act as a wildcard).
fn escape_like(token: &str) -> String {
    token
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// OR-combined WHERE clause for a paper search, or `None` when the criteria
/// produced no clauses at all. An empty `Condition::any()` would render no
/// WHERE clause and match everything; the contract is to match nothing.
fn search_condition(query: &PaperQuery, tagged_paper_ids: Vec<Uuid>) -> Option<Condition> {
    let mut cond = Condition::any();
    let mut clauses = 0;

    for k in &query.title_contains {
        cond = cond.add(Expr::col(PaperColumn::Title).ilike(format!("%{}%", escape_like(k))));
        clauses += 1;
    }
    for k in &query.abstract_contains {
        cond = cond.add(Expr::col(PaperColumn::AbstractText).ilike(format!("%{}%", escape_like(k))));
        clauses += 1;
    }
    if !tagged_paper_ids.is_empty() {
        cond = cond.add(PaperColumn::Id.is_in(tagged_paper_ids));
        clauses += 1;
    }

    (clauses > 0).then_some(cond)
}

impl Repository {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, AppError> {
        let mut opt = sea_orm::ConnectOptions::new(&config.url);
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .sqlx_logging(cfg!(debug_assertions));

        let db = sea_orm::Database::connect(opt)
            .await
            .map_err(|e| AppError::DatabaseConnectionError(e.to_string()))?;

        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Database connection pool initialized"
        );

        Ok(Self { db })
    }

    async fn tags_by_ids(&self, ids: Vec<Uuid>) -> Result<Vec<Tag>, AppError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        Ok(TagEntity::find()
            .filter(TagColumn::Id.is_in(ids))
            .all(&self.db)
            .await?)
    }
}

#[async_trait]
impl Store for Repository {
    async fn find_paper_by_url(&self, url: &str) -> Result<Option<Paper>, AppError> {
        Ok(PaperEntity::find()
            .filter(PaperColumn::Url.eq(url))
            .one(&self.db)
            .await?)
    }

    async fn create_paper(&self, fields: NewPaper) -> Result<Paper, AppError> {
        let model = PaperActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(fields.title),
            abstract_text: Set(fields.abstract_text),
            url: Set(fields.url.clone()),
            source: Set(fields.source),
            published_at: Set(fields.published_at.into()),
            collected_at: Set(Utc::now().into()),
            ai_summary: Set(None),
        };

        match model.insert(&self.db).await {
            Ok(paper) => Ok(paper),
            // A racing batch inserted the same url first; the unique
            // constraint is the ultimate guarantee.
            Err(e) if is_unique_violation(&e) => Err(AppError::AlreadyExists(fields.url)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_paper(&self, id: Uuid) -> Result<Option<Paper>, AppError> {
        Ok(PaperEntity::find_by_id(id).one(&self.db).await?)
    }

    async fn set_ai_summary(&self, id: Uuid, summary: String) -> Result<(), AppError> {
        PaperEntity::update_many()
            .col_expr(PaperColumn::AiSummary, Expr::value(Some(summary)))
            .filter(PaperColumn::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn find_or_create_tag(&self, name: &str, kind: TagKind) -> Result<Tag, AppError> {
        if let Some(tag) = TagEntity::find()
            .filter(TagColumn::Name.eq(name))
            .one(&self.db)
            .await?
        {
            return Ok(tag);
        }

        let model = TagActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            kind: Set(kind),
        };

        match model.insert(&self.db).await {
            Ok(tag) => Ok(tag),
            Err(e) if is_unique_violation(&e) => {
                // Lost the race: a concurrent caller created this name
                // between our check and insert. Re-read the winner.
                TagEntity::find()
                    .filter(TagColumn::Name.eq(name))
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| {
                        AppError::DatabaseQueryError(DbErr::RecordNotFound(format!(
                            "tag '{name}' vanished after conflict"
                        )))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn link_paper_tag(&self, paper_id: Uuid, tag_id: Uuid) -> Result<(), AppError> {
        let model = PaperTagActiveModel {
            paper_id: Set(paper_id),
            tag_id: Set(tag_id),
        };

        match model.insert(&self.db).await {
            Ok(_) => Ok(()),
            // Pair already linked
            Err(e) if is_unique_violation(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn unlink_paper_tag(&self, paper_id: Uuid, tag_id: Uuid) -> Result<(), AppError> {
        PaperTagEntity::delete_many()
            .filter(PaperTagColumn::PaperId.eq(paper_id))
            .filter(PaperTagColumn::TagId.eq(tag_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn tags_for_paper(&self, paper_id: Uuid) -> Result<Vec<Tag>, AppError> {
        let links = PaperTagEntity::find()
            .filter(PaperTagColumn::PaperId.eq(paper_id))
            .all(&self.db)
            .await?;
        self.tags_by_ids(links.into_iter().map(|l| l.tag_id).collect())
            .await
    }

    async fn list_enabled_sources(&self) -> Result<Vec<Source>, AppError> {
        Ok(SourceEntity::find()
            .filter(SourceColumn::Enabled.eq(true))
            .all(&self.db)
            .await?)
    }

    async fn count_enabled_sources(&self) -> Result<u64, AppError> {
        Ok(SourceEntity::find()
            .filter(SourceColumn::Enabled.eq(true))
            .count(&self.db)
            .await?)
    }

    async fn latest_publication_date(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let latest = PaperEntity::find()
            .order_by_desc(PaperColumn::PublishedAt)
            .one(&self.db)
            .await?;
        Ok(latest.map(|p| p.published_at.with_timezone(&Utc)))
    }

    async fn find_papers(
        &self,
        query: &PaperQuery,
        limit: u64,
    ) -> Result<Vec<PaperWithTags>, AppError> {
        if query.is_empty() {
            return Ok(vec![]);
        }

        let mut tagged_paper_ids: Vec<Uuid> = Vec::new();
        if !query.tag_name_in.is_empty() {
            let tag_ids: Vec<Uuid> = TagEntity::find()
                .filter(TagColumn::Name.is_in(query.tag_name_in.clone()))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|t| t.id)
                .collect();
            if !tag_ids.is_empty() {
                tagged_paper_ids = PaperTagEntity::find()
                    .filter(PaperTagColumn::TagId.is_in(tag_ids))
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|l| l.paper_id)
                    .collect();
            }
        }

        let Some(cond) = search_condition(query, tagged_paper_ids) else {
            return Ok(vec![]);
        };

        let papers = PaperEntity::find()
            .filter(cond)
            .order_by_desc(PaperColumn::PublishedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut results = Vec::with_capacity(papers.len());
        for paper in papers {
            let tags = self.tags_for_paper(paper.id).await?;
            results.push(PaperWithTags { paper, tags });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_match_literally() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn tag_only_criteria_with_no_matches_build_no_condition() {
        let query = PaperQuery {
            title_contains: vec![],
            abstract_contains: vec![],
            tag_name_in: vec!["No Such Tag".to_string()],
        };
        // No stored tag matched, so there is nothing to filter on and the
        // search must match nothing rather than everything.
        assert!(search_condition(&query, vec![]).is_none());
    }

    #[test]
    fn keyword_criteria_always_build_a_condition() {
        let query = PaperQuery {
            title_contains: vec!["fraud".to_string()],
            abstract_contains: vec!["fraud".to_string()],
            tag_name_in: vec![],
        };
        assert!(search_condition(&query, vec![]).is_some());

        let tagged = PaperQuery {
            title_contains: vec![],
            abstract_contains: vec![],
            tag_name_in: vec!["Fraud Detection".to_string()],
        };
        assert!(search_condition(&tagged, vec![Uuid::new_v4()]).is_some());
    }
}
