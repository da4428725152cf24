//! `LISTEN`/`NOTIFY` bridge for the Change Distributor (§6).
//!
//! Every mutating trigger in the schema issues `pg_notify(channel, payload)`
//! with a JSON payload shaped like [`Notification`]; this module turns that
//! into a `Stream` the distributor polls.

use crate::errors::StoreError;
use crate::types::Notification;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{instrument, warn};

#[instrument(skip(pool))]
pub async fn subscribe(pool: &PgPool, channel_name: &str) -> Result<BoxStream<'static, Result<Notification, StoreError>>, StoreError> {
    let mut listener = PgListener::connect_with(pool).await.map_err(StoreError::from)?;
    listener.listen(channel_name).await.map_err(StoreError::from)?;

    let stream = stream::unfold(listener, |mut listener| async move {
        match listener.recv().await {
            Ok(notification) => match serde_json::from_str::<Notification>(notification.payload()) {
                Ok(parsed) => Some((Ok(parsed), listener)),
                Err(err) => {
                    warn!(error = %err, payload = notification.payload(), "dropping unparseable notification payload");
                    Some((Err(StoreError::IntegrityViolation(format!("malformed notification payload: {err}"))), listener))
                }
            },
            Err(err) => Some((Err(StoreError::from(err)), listener)),
        }
    });

    Ok(stream.boxed())
}
