use adjacency_tree::prelude::*;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};

mod entity {
    pub mod category {
        use adjacency_tree::AdjacencyTreeModelDerive as AdjacencyTreeModel;
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, DeriveEntityModel, AdjacencyTreeModel)]
        #[sea_orm(table_name = "categories")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            pub parent_id: Option<i32>,
            pub name: String,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::category;

#[tokio::test]
async fn recursive_queries_run_on_postgres() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db) = setup_database().await? else {
        return Ok(());
    };
    reset_tables(&db).await?;

    let tree = category::Model::tree(&db);

    let path = tree.node(3).path().await?.expect("category 3 exists");
    let ids: Vec<(i32, i32)> = path.iter().map(|step| (step.row.id, step.level)).collect();
    assert_eq!(ids, vec![(1, 0), (2, 1), (3, 2)]);

    let below = tree.node(1).descendants(None).await?.expect("root has descendants");
    let ids: Vec<(i32, i32)> = below.iter().map(|step| (step.row.id, step.level)).collect();
    assert_eq!(ids, vec![(2, 1), (3, 2), (4, 2)]);

    let ancestor = tree.node(3).has_ancestor(1, None).await?.expect("1 is above 3");
    assert_eq!(ancestor.level, 2);

    let descendant = tree.node(1).has_descendant(4, Some(2)).await?.expect("4 is below 1");
    assert_eq!((descendant.row.id, descendant.level), (4, 2));

    assert_eq!(tree.node(1).has_child(3).await?, None);
    assert_eq!(tree.node(5).path().await?, None);

    Ok(())
}

async fn setup_database() -> Result<Option<DatabaseConnection>, sea_orm::DbErr> {
    let Ok(url) = std::env::var("ADJACENCY_TREE_TEST_DATABASE_URL") else {
        eprintln!("ADJACENCY_TREE_TEST_DATABASE_URL not set; skipping PostgreSQL test");
        return Ok(None);
    };

    Database::connect(url).await.map(Some)
}

async fn reset_tables(db: &DatabaseConnection) -> Result<(), sea_orm::DbErr> {
    db.execute(Statement::from_string(
        DbBackend::Postgres,
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id SERIAL PRIMARY KEY,
            parent_id INTEGER REFERENCES categories(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        );
        "#,
    ))
    .await?;

    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "TRUNCATE TABLE categories RESTART IDENTITY CASCADE;",
    ))
    .await?;

    db.execute(Statement::from_string(
        DbBackend::Postgres,
        "INSERT INTO categories (id, parent_id, name) VALUES \
            (1, NULL, 'root'), (2, 1, 'branch'), (3, 2, 'leaf-a'), (4, 2, 'leaf-b');",
    ))
    .await?;

    Ok(())
}
