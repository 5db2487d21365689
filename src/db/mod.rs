use std::sync::Arc;

use log::{error, info};
use mongodb::{Client, Database};
use rocket::fairing::AdHoc;

use crate::services::{
    AfricasTalkingService, AuthService, RandomCodeSource, SystemClock,
};
use crate::store::{MongoAccountStore, MongoKycStore, MongoOtpLedger};

/// The engine as wired for production.
pub type AppAuthService = AuthService<MongoAccountStore, MongoOtpLedger, MongoKycStore>;

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                let service = AuthService::new(
                    MongoAccountStore::new(database.clone()),
                    MongoOtpLedger::new(database.clone()),
                    MongoKycStore::new(database.clone()),
                    Arc::new(AfricasTalkingService::from_config()),
                    Arc::new(SystemClock),
                    Arc::new(RandomCodeSource),
                );
                rocket.manage(database).manage(service)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1}, None)
        .await?;

    Ok(client.database("unitedcare"))
}
