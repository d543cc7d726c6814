//! Statement compilation
//!
//! [`CompilerInterface`] wraps an external [`StatementEngine`] for one
//! immutable schema. A new schema means a new interface instance.

mod engine;
mod statement;

pub use engine::{CompileRequest, EngineError, StatementCompiler, StatementEngine};
pub use statement::{Param, Scalar, Statement};

use std::sync::Arc;

use tracing::debug;

use crate::db::Dialect;
use crate::mutation::{ConstraintVerifier, FlagPolicy, TwoStepStatement};
use crate::schema::{Action, Schema};

pub struct CompilerInterface {
    dialect: Dialect,
    schema: Arc<Schema>,
    compiler: Box<dyn StatementCompiler>,
}

impl CompilerInterface {
    /// Bind `engine` to `schema`
    pub fn new(
        engine: &dyn StatementEngine,
        schema: Schema,
        dialect: Dialect,
        allowed_select_functions: Option<&[String]>,
    ) -> Result<Self, EngineError> {
        let compiler = engine.init(&schema, dialect, allowed_select_functions)?;
        debug!(dialect = %dialect, schemas = ?schema.schema_names(), "statement compiler initialized");
        Ok(Self {
            dialect,
            schema: Arc::new(schema),
            compiler,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn compile_main(&self, request: &CompileRequest) -> Result<Statement, EngineError> {
        self.compiler.compile_main(request)
    }

    /// Compile a write into a two-phase coordinator.
    ///
    /// The coordinator's flag policy comes from the schema: a flag column is
    /// required only when the role has a row check on the target and the
    /// dialect cannot enforce it inside the mutation.
    ///
    /// Targets that are not schema objects (`rpc/...` calls, unknown names)
    /// carry no row check here. A flag the statement does report is still
    /// verified, and an unknown relation fails when the statement runs.
    pub fn compile_two_phase(&self, request: &CompileRequest) -> Result<TwoStepStatement, EngineError> {
        let (mutate, select) = self.compiler.compile_two_phase(request)?;
        let action = Action::for_method(&request.method);
        let has_row_check = match self.schema.find_object(&request.schema_name, &request.entity) {
            Some(object) => object.has_row_check(&request.role, action),
            None => {
                debug!(
                    schema = %request.schema_name,
                    entity = %request.entity,
                    "target not in schema, constraint flag optional"
                );
                false
            }
        };
        let policy = FlagPolicy::for_dialect(self.dialect, has_row_check);
        Ok(TwoStepStatement::new(mutate, select, ConstraintVerifier::new(policy)))
    }
}

impl std::fmt::Debug for CompilerInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerInterface")
            .field("dialect", &self.dialect)
            .field("schemas", &self.schema.schema_names())
            .finish()
    }
}
