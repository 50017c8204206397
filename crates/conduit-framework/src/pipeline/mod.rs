//! Compiling handlers into request pipelines.
//!
//! [`PipelineCompiler::compile`] classifies every parameter of a
//! [`HandlerDescriptor`], validates the handler's shape as a whole and
//! produces a [`RequestDelegate`]. All decisions are made here, once; the
//! delegate only replays them against each request.
//!
//! # Example
//!
//! ```rust,ignore
//! let compiler = PipelineCompiler::new(
//!     CompileOptions::new().route_parameters(["id"]),
//! );
//! let delegate = compiler.compile(
//!     handler_fn(get_todo).with_params([ParamSpec::new("id"), ParamSpec::new("verbose")]),
//! )?;
//!
//! delegate.invoke(&ctx).await?;
//! ```

mod body;
mod diagnostics;
mod execute;
mod plan;

use std::fmt;
use std::sync::Arc;

use conduit_core::{CompileError, FormReader, HttpContext, PipelineResult};
use tracing::{Instrument, debug, debug_span};

use crate::binding::BindingCapabilityResolver;
use crate::handler::{ErasedHandler, HandlerDescriptor};
use crate::options::CompileOptions;
use crate::result::{ResultAdapter, ResultWriter};
use crate::source::{ClassifiedParameter, ParameterSourceClassifier};
use plan::BindingPlan;

pub use diagnostics::{BINDING_LOG_TARGET, BindingEvent};

/// Compiles handlers with one set of options.
pub struct PipelineCompiler {
    options: CompileOptions,
    resolver: BindingCapabilityResolver,
}

impl PipelineCompiler {
    /// Creates a compiler.
    pub fn new(options: CompileOptions) -> Self {
        let resolver = BindingCapabilityResolver::with_cache(options.binding, options.cache.clone());
        Self { options, resolver }
    }

    /// The options handlers are compiled with.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compiles `handler` into a request delegate.
    pub fn compile(&self, handler: HandlerDescriptor) -> Result<RequestDelegate, CompileError> {
        let classifier = ParameterSourceClassifier::new(&self.resolver, &self.options);

        let parameters = handler
            .parameters()
            .iter()
            .map(|parameter| {
                let classified = classifier.classify(parameter)?;
                if !parameter.default_matches() {
                    return Err(CompileError::DefaultValueMismatch {
                        parameter: parameter.name().unwrap_or_default().to_string(),
                        type_name: parameter.declared().name().to_string(),
                    });
                }
                Ok(classified)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let plan = BindingPlan::new(parameters);
        let bodies: Vec<usize> = plan
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.source.is_body())
            .map(|(index, _)| index)
            .collect();
        if bodies.len() > 1 {
            return Err(CompileError::MultipleBodyParameters {
                parameters: bodies
                    .iter()
                    .map(|&index| plan.slots()[index].descriptor.display_name())
                    .collect(),
            });
        }
        let body_slot = bodies.first().copied();
        let form = plan.slots().iter().find(|slot| slot.source.is_form());
        if let (Some(index), Some(form)) = (body_slot, form) {
            return Err(CompileError::BodyAndFormMixed {
                body: plan.slots()[index].descriptor.display_name(),
                form: form.descriptor.display_name(),
            });
        }
        let has_form = form.is_some();

        let writer = ResultAdapter::adapt(handler.reply())?;

        debug!(
            endpoint = handler.name(),
            parameters = plan.slots().len(),
            reply = %handler.reply(),
            "compiled request pipeline"
        );

        Ok(RequestDelegate {
            pipeline: Arc::new(CompiledPipeline {
                name: handler.name().to_string(),
                plan,
                writer,
                handler: handler.invoker().clone(),
                form_reader: self.options.form_reader.clone(),
                throw_on_bad_request: self.options.binding.throw_on_bad_request,
                nullability_tracking: handler.nullability_tracking(),
                has_form,
                body_slot,
            }),
        })
    }
}

impl fmt::Debug for PipelineCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineCompiler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The immutable result of compiling one handler.
pub(crate) struct CompiledPipeline {
    name: String,
    plan: BindingPlan,
    writer: ResultWriter,
    handler: ErasedHandler,
    form_reader: Arc<dyn FormReader>,
    throw_on_bad_request: bool,
    nullability_tracking: bool,
    has_form: bool,
    body_slot: Option<usize>,
}

/// A compiled handler, invoked once per request.
///
/// Cloning is cheap; clones share the compiled pipeline.
#[derive(Clone)]
pub struct RequestDelegate {
    pipeline: Arc<CompiledPipeline>,
}

impl RequestDelegate {
    /// The handler name.
    pub fn name(&self) -> &str {
        &self.pipeline.name
    }

    /// The classified handler parameters, in declaration order.
    pub fn parameters(&self) -> &[ClassifiedParameter] {
        self.pipeline.plan.parameters()
    }

    /// The result writer.
    pub fn writer(&self) -> &ResultWriter {
        &self.pipeline.writer
    }

    /// Binds the handler's arguments from `ctx`, invokes it and writes its
    /// result.
    ///
    /// Binding failures either end the call with a 400 response and `Ok(())`
    /// or, with `throw_on_bad_request`, surface as
    /// [`PipelineError::BadRequest`](conduit_core::PipelineError::BadRequest).
    pub async fn invoke(&self, ctx: &HttpContext) -> PipelineResult<()> {
        let span = debug_span!("endpoint", endpoint = %self.pipeline.name);
        self.pipeline.execute(ctx).instrument(span).await
    }
}

impl fmt::Debug for RequestDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDelegate")
            .field("name", &self.pipeline.name)
            .field("parameters", &self.pipeline.plan.slots().len())
            .field("writer", &self.pipeline.writer)
            .finish()
    }
}
