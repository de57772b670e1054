//! Database schema management and seed data.

use crav_core::Category;
use sqlx::PgPool;

use crate::error::{Result, StoreError};

/// Migrations embedded from `crates/crav-store/migrations`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `StoreError::Database` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Marketplace categories seeded by the initial migration.
///
/// Keep in sync with the `INSERT INTO marketplace_categories` statement in
/// the initial migration.
#[must_use]
pub fn default_categories() -> Vec<Category> {
    [
        ("audio-tools", "Audio Tools", "Plugins, samples and mastering services", 1),
        ("visual-assets", "Visual Assets", "Overlays, loops and visualizer presets", 2),
        ("templates", "Templates", "Video, logo and social templates", 3),
        ("music", "Music", "Licensable tracks and stems", 4),
        ("services", "Creator Services", "Editing, mixing and design for hire", 5),
    ]
    .into_iter()
    .map(|(slug, name, description, sort_order)| Category {
        slug: slug.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        sort_order,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_categories_are_ordered_and_unique() {
        let categories = default_categories();
        let mut slugs: Vec<_> = categories.iter().map(|c| c.slug.as_str()).collect();
        slugs.dedup();
        assert_eq!(slugs.len(), categories.len());
        assert!(categories.windows(2).all(|w| w[0].sort_order < w[1].sort_order));
    }

    #[test]
    fn migration_seeds_the_same_slugs() {
        let sql = include_str!("../migrations/20260101000000_initial.sql");
        for category in default_categories() {
            assert!(sql.contains(&format!("'{}'", category.slug)), "{}", category.slug);
        }
    }
}
