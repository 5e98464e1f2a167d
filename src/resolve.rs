//! Type resolution and value fetching for a single key.

use tracing::warn;

use crate::error::StoreError;
use crate::pool::{ConnectionPool, Side};
use crate::value::{ContainerType, Value};

/// What one side said about a key's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeReport {
    Known(ContainerType),
    /// A type name outside the supported shapes (`zset`, `stream`, `none`, ...).
    Unsupported(String),
    /// The type query itself failed.
    Failed,
}

impl TypeReport {
    pub fn from_type_name(name: &str) -> Self {
        match ContainerType::from_type_name(name) {
            Some(ty) => TypeReport::Known(ty),
            None => TypeReport::Unsupported(name.to_string()),
        }
    }
}

pub struct TypeResolver;

impl TypeResolver {
    /// Query both sides for the key's type and reduce to one kind.
    ///
    /// Only transport faults are returned as errors.
    pub async fn resolve(pool: &ConnectionPool, key: &str) -> Result<ContainerType, StoreError> {
        let (a, b) = tokio::join!(
            Self::resolve_side(pool, Side::A, key),
            Self::resolve_side(pool, Side::B, key),
        );
        Ok(Self::reduce(&a?, &b?))
    }

    /// Combine the two reports.
    ///
    /// Equal known types resolve to that type, differing known types are a
    /// mismatch. Any unsupported type name makes the key unknown. A failed
    /// query against a known type on the other side counts as a mismatch.
    pub fn reduce(a: &TypeReport, b: &TypeReport) -> ContainerType {
        match (a, b) {
            (TypeReport::Known(x), TypeReport::Known(y)) if x == y => *x,
            (TypeReport::Known(_), TypeReport::Known(_)) => ContainerType::Mismatch,
            (TypeReport::Unsupported(_), _) | (_, TypeReport::Unsupported(_)) => ContainerType::Unknown,
            (TypeReport::Failed, TypeReport::Failed) => ContainerType::Unknown,
            (TypeReport::Failed, TypeReport::Known(_)) | (TypeReport::Known(_), TypeReport::Failed) => {
                ContainerType::Mismatch
            }
        }
    }

    /// What one side reports for the key. Only transport faults are errors.
    pub async fn resolve_side(pool: &ConnectionPool, side: Side, key: &str) -> Result<TypeReport, StoreError> {
        match pool.handle(side).key_type(key).await {
            Ok(name) => Ok(TypeReport::from_type_name(&name)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(%side, key, error = %e, "type query failed");
                Ok(TypeReport::Failed)
            }
        }
    }
}

pub struct ValueFetcher;

impl ValueFetcher {
    /// Read the full value from both sides with the type-appropriate command.
    ///
    /// `Mismatch` and `Unknown` return stand-ins without touching either store.
    pub async fn fetch(
        pool: &ConnectionPool,
        key: &str,
        ty: ContainerType,
    ) -> Result<(Value, Value), StoreError> {
        match ty {
            ContainerType::Mismatch => Ok((Value::Mismatched, Value::Mismatched)),
            ContainerType::Unknown => Ok((Value::Missing, Value::Missing)),
            _ => {
                let (a, b) = tokio::join!(
                    Self::fetch_side(pool, Side::A, key, ty),
                    Self::fetch_side(pool, Side::B, key, ty),
                );
                Ok((a?, b?))
            }
        }
    }

    /// Read one side. Per-key failures are logged and yield `Unreadable`.
    pub async fn fetch_side(
        pool: &ConnectionPool,
        side: Side,
        key: &str,
        ty: ContainerType,
    ) -> Result<Value, StoreError> {
        let handle = pool.handle(side);
        let result = match ty {
            ContainerType::Scalar => handle
                .get(key)
                .await
                .map(|v| v.map(Value::Scalar).unwrap_or(Value::Missing)),
            ContainerType::List => handle.lrange_all(key).await.map(Value::List),
            ContainerType::Set => handle.smembers(key).await.map(Value::Set),
            ContainerType::Map => handle.hgetall(key).await.map(Value::Map),
            ContainerType::Mismatch => return Ok(Value::Mismatched),
            ContainerType::Unknown => return Ok(Value::Missing),
        };

        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(%side, %ty, key, error = %e, "read failed");
                Ok(Value::Unreadable)
            }
        }
    }
}
