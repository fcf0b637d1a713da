//! MongoDB Index Initialization
//!
//! Creates indexes for all collections on application startup. The unique
//! `(userId, kind)` index on credential tokens is what makes token issue
//! single-flight.

use mongodb::{bson::doc, options::IndexOptions, Database, IndexModel};
use tracing::info;

/// Initialize all MongoDB indexes
pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    info!("Initializing MongoDB indexes...");

    create_user_indexes(db).await?;
    create_role_indexes(db).await?;
    create_credential_indexes(db).await?;
    create_service_indexes(db).await?;
    create_service_request_indexes(db).await?;

    info!("MongoDB indexes initialized successfully");
    Ok(())
}

fn unique(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).background(true).build())
        .build()
}

fn plain(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().background(true).build())
        .build()
}

async fn create_user_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let users = db.collection::<mongodb::bson::Document>("users");

    // Email lookup (unique across live and deleted users)
    users.create_index(unique(doc! { "email": 1 })).await?;
    users.create_index(plain(doc! { "roleId": 1 })).await?;

    info!("Created indexes on users");
    Ok(())
}

async fn create_role_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let roles = db.collection::<mongodb::bson::Document>("roles");
    roles.create_index(unique(doc! { "title": 1 })).await?;

    info!("Created indexes on roles");
    Ok(())
}

async fn create_credential_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let tokens = db.collection::<mongodb::bson::Document>("credential_tokens");

    // One slot per user and kind
    tokens.create_index(unique(doc! { "userId": 1, "kind": 1 })).await?;

    info!("Created indexes on credential_tokens");
    Ok(())
}

async fn create_service_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let services = db.collection::<mongodb::bson::Document>("services");
    services.create_index(unique(doc! { "name": 1 })).await?;

    info!("Created indexes on services");
    Ok(())
}

async fn create_service_request_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let requests = db.collection::<mongodb::bson::Document>("service_requests");

    requests.create_index(plain(doc! { "userId": 1, "createdAt": -1 })).await?;
    requests.create_index(plain(doc! { "serviceId": 1 })).await?;

    info!("Created indexes on service_requests");
    Ok(())
}
