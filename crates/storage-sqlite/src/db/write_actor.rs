//! Single-writer actor.
//!
//! SQLite allows one writer at a time. All mutations are funnelled through one
//! task that owns a dedicated connection and runs each job inside an
//! `IMMEDIATE` transaction, so a job either commits completely or not at all.

use std::any::Any;

use diesel::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use super::DbPool;
use crate::errors::StorageError;
use marketfeed_core::errors::{DatabaseError, Error, Result};

type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;
type AnyResult = Box<dyn Any + Send + 'static>;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    #[allow(clippy::type_complexity)]
    tx: mpsc::Sender<(Job<AnyResult>, oneshot::Sender<Result<AnyResult>>)>,
}

fn writer_stopped() -> Error {
    Error::Database(DatabaseError::Internal(
        "database writer has stopped".to_string(),
    ))
}

impl WriteHandle {
    /// Run `job` on the writer's connection inside one transaction.
    ///
    /// An `Err` from the job rolls the transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as AnyResult)),
                ret_tx,
            ))
            .await
            .map_err(|_| writer_stopped())?;

        let boxed = ret_rx.await.map_err(|_| writer_stopped())??;
        boxed.downcast::<T>().map(|v| *v).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "writer returned an unexpected result type".to_string(),
            ))
        })
    }
}

/// Spawn the writer task on the current Tokio runtime.
///
/// The task holds one pooled connection for its whole life and stops once
/// every [`WriteHandle`] has been dropped.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<(Job<AnyResult>, oneshot::Sender<Result<AnyResult>>)>(1024);

    tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("Database writer could not get a connection: {}", e);
                return;
            }
        };

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<AnyResult> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(Error::from);

            // The caller may have gone away
            let _ = reply_tx.send(result);
        }
        debug!("Database writer stopped");
    });

    WriteHandle { tx }
}
