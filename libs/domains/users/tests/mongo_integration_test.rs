//! MongoDB integration tests for the Users domain
//!
//! These start a MongoDB container and are ignored by default.
//! Run with: `cargo test -p domain_users -- --ignored`

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use domain_users::models::{NewUser, UserChanges};
use domain_users::{CreateUser, MongoUserRepository, UserError, UserRepository, UserService};
use mongodb::IndexModel;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::IndexOptions;
use test_utils::{TestDataBuilder, TestMongo};

async fn setup(test_name: &str) -> (TestMongo, MongoUserRepository, TestDataBuilder) {
    let mongo = TestMongo::new().await;
    let builder = TestDataBuilder::from_test_name(test_name);
    let repo = MongoUserRepository::new(&mongo.database(&builder.database_name()));
    (mongo, repo, builder)
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_create_assigns_object_id_and_stores_hash() {
    let (mongo, repo, builder) = setup("mongo_create").await;
    let service = UserService::new(repo);

    let created = service
        .create_user(CreateUser {
            name: "A".to_string(),
            email: builder.email("a"),
            password: "p".to_string(),
        })
        .await
        .unwrap();

    let id = ObjectId::parse_str(&created.id).unwrap();
    let repo = MongoUserRepository::new(&mongo.database(&builder.database_name()));
    let stored = repo.get_by_id(id).await.unwrap().unwrap();

    assert_ne!(stored.password_hash, "p");
    let parsed = PasswordHash::new(&stored.password_hash).unwrap();
    assert!(Argon2::default().verify_password(b"p", &parsed).is_ok());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_unique_index_rejects_duplicate_email() {
    let (_mongo, repo, builder) = setup("mongo_duplicate").await;
    let email = builder.email("dup");

    repo.create(NewUser::new("A".into(), email.clone(), "h".into()))
        .await
        .unwrap();
    let result = repo
        .create(NewUser::new("B".into(), email.clone(), "h".into()))
        .await;

    assert!(matches!(result, Err(UserError::DuplicateEmail(ref e)) if e == &email));

    let count = repo
        .collection()
        .count_documents(doc! { "email": &email })
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_update_to_taken_email_is_duplicate() {
    let (_mongo, repo, builder) = setup("mongo_update_duplicate").await;

    repo.create(NewUser::new("A".into(), builder.email("a"), "h".into()))
        .await
        .unwrap();
    let other = repo
        .create(NewUser::new("B".into(), builder.email("b"), "h".into()))
        .await
        .unwrap();

    let changes = UserChanges {
        name: None,
        email: Some(builder.email("a")),
        password_hash: None,
        updated_at: chrono::Utc::now(),
    };
    let result = repo.update(other.id, changes).await;

    assert!(matches!(result, Err(UserError::DuplicateEmail(_))));
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_partial_update_and_delete() {
    let (_mongo, repo, builder) = setup("mongo_update_delete").await;

    let user = repo
        .create(NewUser::new("A".into(), builder.email("a"), "h".into()))
        .await
        .unwrap();

    let changes = UserChanges {
        name: Some("B".into()),
        email: None,
        password_hash: None,
        updated_at: chrono::Utc::now(),
    };
    assert!(repo.update(user.id, changes.clone()).await.unwrap());
    assert!(!repo.update(ObjectId::new(), changes).await.unwrap());

    let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "B");
    assert_eq!(stored.email, builder.email("a"));
    assert_eq!(stored.password_hash, "h");

    assert!(repo.delete(user.id).await.unwrap());
    assert!(!repo.delete(user.id).await.unwrap());
    assert!(repo.get_by_id(user.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_list_is_ordered_by_id() {
    let (_mongo, repo, builder) = setup("mongo_list").await;

    let first = repo
        .create(NewUser::new("A".into(), builder.email("a"), "h".into()))
        .await
        .unwrap();
    let second = repo
        .create(NewUser::new("B".into(), builder.email("b"), "h".into()))
        .await
        .unwrap();

    let ids: Vec<_> = repo.list().await.unwrap().into_iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_ensure_indexes_reuses_existing_default_email_index() {
    let (_mongo, repo, builder) = setup("mongo_existing_index").await;

    // An index created by an earlier deployment under the default name
    let existing = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    repo.collection().create_index(existing).await.unwrap();

    repo.ensure_indexes().await.unwrap();
    repo.create(NewUser::new("A".into(), builder.email("a"), "h".into()))
        .await
        .unwrap();

    let names = repo.collection().list_index_names().await.unwrap();
    assert!(names.contains(&"email_1".to_string()));
    assert_eq!(names.len(), 2); // _id_ and email_1
}
