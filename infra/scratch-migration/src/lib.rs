pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_users;
mod m20240102_000002_create_games;
mod m20240103_000003_create_tags_and_comments;
mod m20240104_000004_create_tasks;
mod m20240105_000005_add_two_factor;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users::Migration),
            Box::new(m20240102_000002_create_games::Migration),
            Box::new(m20240103_000003_create_tags_and_comments::Migration),
            Box::new(m20240104_000004_create_tasks::Migration),
            Box::new(m20240105_000005_add_two_factor::Migration),
        ]
    }
}
