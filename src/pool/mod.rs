//! Per-provider connection pools.
//!
//! A [`ConnectionPool`] owns a bounded set of [`Connection`]s wrapping any
//! [`PooledResource`]. The facade keeps one pool of [`HttpSession`]s per
//! registered provider.

pub mod connection;
pub mod manager;


pub use connection::{
    Connection, ConnectionId, HttpSession, HttpSessionFactory, PooledResource, ResourceFactory,
};
pub use manager::{ConnectionPool, PoolConfig, PoolStats};
