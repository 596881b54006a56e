//! Galaxies: virtual relations backed by an underlying query
//!
//! A galaxy exposes one logical column of a (usually structured) type while
//! its rows actually live in a multi-column underlying query. Types that
//! know how they spread over several columns carry a [`DbTypeData`] bundle
//! as their extension data.

use crate::error::{AlgebraError, AlgebraResult, BoxError};
use crate::ir::expr::Expr;
use crate::ir::query::{Query, RelationHandle};
use crate::ir::schema::Schema;
use nb_core::types::{FromDatumFn, MemberFn, ToDatumFn};
use nb_core::{BaseTypeOptions, Type, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Database connection handed to galaxy setup procedures
pub trait Connection {
    /// Execute one or more statements without results
    fn execute_batch(&mut self, sql: &str) -> Result<(), BoxError>;
}

/// Idempotent provisioning procedure of a galaxy
pub type SetupFn = Arc<dyn Fn(&mut dyn Connection) -> Result<(), BoxError> + Send + Sync>;
/// Rebuilds a structured value from its flattened column values
pub type ReifyFn = Arc<dyn Fn(&[Value]) -> AlgebraResult<Value> + Send + Sync>;
/// Spreads a structured constant over column expressions
pub type EncodeFn = Arc<dyn Fn(&Value) -> AlgebraResult<Expr> + Send + Sync>;

/// How a structured type maps onto database columns
#[derive(Clone)]
pub struct DbTypeData {
    /// Columns one value occupies, in order
    pub schema: Schema,
    /// Flattened column values to structured value
    pub reifier: ReifyFn,
    /// Structured constant to column expressions (usually a tuple)
    pub encoder: EncodeFn,
}

impl std::fmt::Debug for DbTypeData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbTypeData")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Build a base type that carries [`DbTypeData`]
pub fn db_type(
    name: impl Into<String>,
    member: MemberFn,
    to_datum: ToDatumFn,
    from_datum: FromDatumFn,
    data: DbTypeData,
) -> Type {
    Type::base(
        name,
        member,
        to_datum,
        from_datum,
        BaseTypeOptions::default().with_extension(data),
    )
}

/// The [`DbTypeData`] of a type (looking through `Nullable`), if any
pub fn db_type_data(ty: &Type) -> Option<&DbTypeData> {
    ty.non_null().extension::<DbTypeData>()
}

/// A virtual relation
pub struct Galaxy {
    name: String,
    ty: Type,
    setup: SetupFn,
    query: Query,
}

impl Galaxy {
    /// Galaxy name, also the name of its single logical column
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the logical column
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Underlying multi-column query
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Exposed single-column schema
    pub fn schema(&self) -> Schema {
        Schema::single(self.name.clone(), self.ty.clone())
    }

    /// Run the setup procedure
    pub fn provision(&self, conn: &mut dyn Connection) -> Result<(), BoxError> {
        (self.setup)(conn)
    }
}

impl std::fmt::Debug for Galaxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Galaxy")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Catalog of installed galaxies, keyed by name
#[derive(Debug, Default, Clone)]
pub struct GalaxyRegistry {
    galaxies: BTreeMap<String, Arc<Galaxy>>,
}

impl GalaxyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a galaxy and return the base relation standing for it.
    /// Installing under an existing name replaces the previous galaxy.
    pub fn install(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        setup: SetupFn,
        query: Query,
    ) -> Query {
        let galaxy = Arc::new(Galaxy {
            name: name.into(),
            ty,
            setup,
            query,
        });
        let name = galaxy.name.clone();
        log::debug!("Installing galaxy '{}' of type {}", name, galaxy.ty);
        let relation = Query::BaseRelation {
            name: name.clone(),
            schema: galaxy.schema(),
            handle: RelationHandle::Galaxy(Arc::clone(&galaxy)),
        };
        if self.galaxies.insert(name.clone(), galaxy).is_some() {
            log::warn!("Galaxy '{name}' re-registered; previous definition replaced");
        }
        relation
    }

    /// Installed galaxy by name
    pub fn get(&self, name: &str) -> Option<&Arc<Galaxy>> {
        self.galaxies.get(name)
    }

    /// Base relation for an installed galaxy
    pub fn relation(&self, name: &str) -> Option<Query> {
        self.get(name).map(|g| Query::BaseRelation {
            name: g.name.clone(),
            schema: g.schema(),
            handle: RelationHandle::Galaxy(Arc::clone(g)),
        })
    }

    /// Installed names in order
    pub fn names(&self) -> Vec<&str> {
        self.galaxies.keys().map(String::as_str).collect()
    }

    /// Number of installed galaxies
    pub fn len(&self) -> usize {
        self.galaxies.len()
    }

    /// Whether nothing is installed
    pub fn is_empty(&self) -> bool {
        self.galaxies.is_empty()
    }

    /// Run every setup procedure against `conn`, in name order. Stops at
    /// the first failure. Returns the number of galaxies provisioned.
    pub fn provision_all(&self, conn: &mut dyn Connection) -> AlgebraResult<usize> {
        let snapshot: Vec<Arc<Galaxy>> = self.galaxies.values().cloned().collect();
        for galaxy in &snapshot {
            log::debug!("Provisioning galaxy '{}'", galaxy.name);
            galaxy
                .provision(conn)
                .map_err(|source| AlgebraError::ProvisionFailed {
                    galaxy: galaxy.name.clone(),
                    source,
                })?;
        }
        Ok(snapshot.len())
    }
}
