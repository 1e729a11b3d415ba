use crate::base::neterror::NetError;
use crate::http::response::Response;
use crate::interceptor::{Chain, Interceptor};
use crate::socket::connection::Connection;
use crate::socket::pool::ConnectionPool;
use futures::future::BoxFuture;

/// Binds a connection to the rest of the chain: a pooled one when
/// available, otherwise a fresh unopened one.
///
/// On success the connection goes back to the pool if both sides allow
/// keep-alive; on failure it is closed before the error propagates.
#[derive(Debug, Clone)]
pub struct ConnectInterceptor {
    pool: ConnectionPool,
}

impl ConnectInterceptor {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

impl Interceptor for ConnectInterceptor {
    fn intercept<'a>(&'a self, mut chain: Chain<'a>) -> BoxFuture<'a, Result<Response, NetError>> {
        Box::pin(async move {
            let request = chain.request().clone();
            let mut conn = match self.pool.get_for(request.url()) {
                Some(conn) => conn,
                None => Connection::for_url(request.url()),
            };

            let result = chain.proceed_with_connection(request, &mut conn).await;
            match &result {
                Ok(response) if response.keep_alive() && conn.is_open() => self.pool.put(conn),
                Ok(_) => conn.close(),
                Err(e) => {
                    tracing::debug!(id = conn.id(), host = %conn.host(), error = %e, "exchange failed");
                    conn.close();
                }
            }
            result
        })
    }
}
