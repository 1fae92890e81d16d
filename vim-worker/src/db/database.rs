use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};

use crate::config::DatabaseConfig;

/// The database connection pool, running blocking tasks in a
/// way that does not block the async event loop.
#[derive(Debug)]
pub struct Database<T>
where
    T: diesel::Connection + r2d2::R2D2Connection + 'static,
{
    connection_pool: Pool<ConnectionManager<T>>,
}

impl<T> Clone for Database<T>
where
    T: diesel::Connection + r2d2::R2D2Connection + 'static,
{
    fn clone(&self) -> Self {
        Self {
            connection_pool: self.connection_pool.clone(),
        }
    }
}

impl<T> Database<T>
where
    T: diesel::Connection + r2d2::R2D2Connection + 'static,
{
    /// Constructs a `Database<T>` for the given database config (creates a connection pool).
    pub fn new(database_config: &DatabaseConfig) -> Self {
        let mut builder = r2d2::Builder::default();
        if let Some(max_size) = database_config.max_conns {
            builder = builder.max_size(max_size)
        }

        Self::from_pool_builder(database_config.url.as_str(), builder)
    }

    /// Creates a `Database<T>` with a custom connection pool builder.
    pub fn from_pool_builder(
        database_url: &str,
        builder: diesel::r2d2::Builder<ConnectionManager<T>>,
    ) -> Self {
        let manager = ConnectionManager::new(database_url);
        let connection_pool = builder
            .build(manager)
            .expect("could not initiate the database connection pool");
        Database { connection_pool }
    }

    /// Runs the given closure in a way that is safe for blocking IO to the database.
    /// The closure will be passed a `Connection` from the pool to use.
    pub async fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut PooledConnection<ConnectionManager<T>>) -> R + Send + 'static,
        R: Send + 'static,
        T: Send,
    {
        let pool = self.connection_pool.clone();
        let future = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().expect("could not check out a database connection");
            f(&mut conn)
        });

        future.await.expect("database task panicked")
    }

    /// Runs the given closure in a way that is safe for blocking IO to the database.
    /// The closure will be passed a `Connection` from the pool to use.
    /// This closure will run in the context of a database transaction.
    /// If an error occurs, the database changes made in this closure will get rolled back to their original state.
    pub async fn transaction<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut PooledConnection<ConnectionManager<T>>) -> Result<R, E> + Send + 'static,
        T: Send,
        R: Send + 'static,
        E: From<diesel::result::Error> + Send + 'static,
    {
        let pool = self.connection_pool.clone();
        let future = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().expect("could not check out a database connection");
            conn.transaction(|conn| f(conn))
        });

        future.await.expect("database task panicked")
    }
}
