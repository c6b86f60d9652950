// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Credentials (delegated Strava tokens)
//! - Activities (global store and event partitions)
//! - Events, registrations, and profiles

use crate::db::{
    collections, event_activity_doc_id, most_recent_first, registration_doc_id, Store,
};
use crate::error::AppError;
use crate::models::{Credential, Event, NormalizedActivity, Profile, Registration};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::PersistenceFailed(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::PersistenceFailed(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every operation returns `PersistenceFailed`.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::PersistenceFailed("Database not connected (offline mode)".to_string())
        })
    }

    // ─── Seeding (admin screens own these in production) ────────

    /// Create or update a registration.
    pub async fn set_registration(&self, registration: &Registration) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REGISTRATIONS)
            .document_id(registration_doc_id(
                &registration.event_id,
                &registration.user_id,
            ))
            .object(registration)
            .execute()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(())
    }

    /// Create or update a profile.
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile.user_id)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(())
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client.begin_transaction().await.map_err(|e| {
                AppError::PersistenceFailed(format!("Failed to begin transaction: {}", e))
            })?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::PersistenceFailed(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::PersistenceFailed(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}

impl Store for FirestoreDb {
    // ─── Credential Operations ───────────────────────────────────

    async fn get_credential(&self, user_id: &str) -> Result<Option<Credential>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CREDENTIALS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))
    }

    async fn set_credential(&self, credential: &Credential) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CREDENTIALS)
            .document_id(&credential.user_id)
            .object(credential)
            .execute()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(())
    }

    // ─── Activity Operations ─────────────────────────────────────

    async fn upsert_activity(&self, activity: &NormalizedActivity) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(activity.external_id.to_string())
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_activities_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<NormalizedActivity>, AppError> {
        // Equality filters only; sorted client-side
        let rows = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(most_recent_first(rows))
    }

    // ─── Event Partition Operations ──────────────────────────────

    async fn upsert_event_activity(
        &self,
        event_id: &str,
        activity: &NormalizedActivity,
    ) -> Result<(), AppError> {
        let record = NormalizedActivity {
            event_id: Some(event_id.to_string()),
            ..activity.clone()
        };

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::EVENT_ACTIVITIES)
            .document_id(event_activity_doc_id(event_id, activity.external_id))
            .object(&record)
            .execute()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_event_activities_for_user(
        &self,
        event_id: &str,
        user_id: &str,
    ) -> Result<Vec<NormalizedActivity>, AppError> {
        let rows = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::EVENT_ACTIVITIES)
            .filter(|q| {
                q.for_all([
                    q.field("event_id").eq(event_id),
                    q.field("user_id").eq(user_id),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(most_recent_first(rows))
    }

    async fn delete_event_activities(&self, event_id: &str) -> Result<usize, AppError> {
        let rows: Vec<NormalizedActivity> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::EVENT_ACTIVITIES)
            .filter(|q| q.for_all([q.field("event_id").eq(event_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;

        let count = rows.len();
        self.batch_delete(
            &rows,
            collections::EVENT_ACTIVITIES,
            |row: &NormalizedActivity| event_activity_doc_id(event_id, row.external_id),
        )
        .await?;

        tracing::debug!(event_id, count, "Deleted event activities");
        Ok(count)
    }

    // ─── Event & Registration Operations ─────────────────────────

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::EVENTS)
            .obj()
            .one(event_id)
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))
    }

    async fn set_event(&self, event: &Event) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::EVENTS)
            .document_id(&event.id)
            .object(event)
            .execute()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_registrations_for_event(
        &self,
        event_id: &str,
    ) -> Result<Vec<Registration>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REGISTRATIONS)
            .filter(|q| q.for_all([q.field("event_id").eq(event_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))
    }

    async fn get_registrations_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<Registration>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REGISTRATIONS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::PersistenceFailed(e.to_string()))
    }
}
