//! Executing a compiled pipeline against one request.
//!
//! Binding runs in three phases over the flattened slots:
//!
//! 1. context values, `bind_async` capabilities and services, awaited one
//!    after another in declaration order;
//! 2. the JSON body or the form, guarded by content type;
//! 3. text values from the route, query string, headers and form fields.
//!
//! Failures in phases 1 and 3 are collected, so every offending parameter is
//! logged before the request is answered with 400.

use conduit_core::model::SpecialKind;
use conduit_core::value::bound;
use conduit_core::{
    BadRequest, BoundValue, FormCollection, HttpContext, PipelineError, PipelineResult,
    RequestBody,
};
use tracing::warn;

use super::CompiledPipeline;
use super::body::{self, BodyRead, cancellable};
use super::diagnostics::{self, BindingEvent, Failures};
use crate::source::{ClassifiedParameter, ResolvedSource, TextParser};

const CREDENTIALED_FORM: &str =
    "Form values cannot be bound on a request that carries a bearer token or a client certificate.";

enum Flow {
    Continue,
    Stop,
}

impl CompiledPipeline {
    pub(crate) async fn execute(&self, ctx: &HttpContext) -> PipelineResult<()> {
        let mut failures = Failures::new(self.throw_on_bad_request);

        if self.has_form && is_credentialed(ctx) {
            warn!(endpoint = %self.name, "{CREDENTIALED_FORM}");
            if self.throw_on_bad_request {
                return Err(BadRequest::bad_request(CREDENTIALED_FORM).into());
            }
            diagnostics::set_status(ctx, 400);
            return Ok(());
        }

        let slots = self.plan.slots();
        let mut values: Vec<Option<BoundValue>> = std::iter::repeat_with(|| None)
            .take(slots.len())
            .collect();

        for (index, slot) in slots.iter().enumerate() {
            values[index] = self.bind_context(ctx, slot, &mut failures).await?;
        }

        let mut form = None;
        if let Flow::Stop = self
            .bind_payload(ctx, &mut values, &mut form, &mut failures)
            .await?
        {
            return Ok(());
        }

        for (index, slot) in slots.iter().enumerate() {
            if let Some(value) = self.bind_text(ctx, slot, form.as_ref(), &mut failures)? {
                values[index] = Some(value);
            }
        }

        if failures.any() {
            diagnostics::set_status(ctx, 400);
            return Ok(());
        }

        let arguments = self.plan.assemble(values, self.nullability_tracking)?;
        let reply = (self.handler)(arguments).await?;
        self.writer.write(reply, ctx).await
    }

    /// Phase 1.
    async fn bind_context(
        &self,
        ctx: &HttpContext,
        slot: &ClassifiedParameter,
        failures: &mut Failures,
    ) -> PipelineResult<Option<BoundValue>> {
        let parameter = &slot.descriptor;
        match &slot.source {
            ResolvedSource::SpecialContext(kind) => Ok(special(ctx, *kind)),
            ResolvedSource::BindCapability(candidate) => {
                let value = cancellable(ctx, candidate.bind(ctx.clone(), parameter.parameter_info()))
                    .await?
                    .map_err(PipelineError::Capability)?;
                if value.is_none() && !parameter.is_optional(self.nullability_tracking) {
                    failures.fail(
                        BindingEvent::RequiredParameterNotProvided,
                        diagnostics::required_missing(parameter, &candidate.describe()),
                    )?;
                }
                Ok(value)
            }
            ResolvedSource::Service { required } => {
                let model = parameter.model();
                let service = ctx.services().and_then(|services| services.get(model.id()));
                if service.is_none() && *required {
                    return Err(PipelineError::ServiceNotFound {
                        type_name: model.name().to_string(),
                    });
                }
                Ok(service)
            }
            _ => Ok(None),
        }
    }

    /// Phase 2.
    async fn bind_payload(
        &self,
        ctx: &HttpContext,
        values: &mut [Option<BoundValue>],
        form: &mut Option<FormCollection>,
        failures: &mut Failures,
    ) -> PipelineResult<Flow> {
        let slots = self.plan.slots();

        if let Some(index) = self.body_slot {
            let slot = &slots[index];
            let ResolvedSource::Body {
                allow_empty,
                inferred,
            } = slot.source
            else {
                return Ok(Flow::Continue);
            };
            match body::read_json(ctx, &slot.descriptor, failures).await? {
                BodyRead::Read(value) => values[index] = Some(value),
                BodyRead::Empty => {
                    let parameter = &slot.descriptor;
                    if !allow_empty && !parameter.is_optional(self.nullability_tracking) {
                        if inferred {
                            failures.fail(
                                BindingEvent::ImplicitBodyNotProvided,
                                diagnostics::implicit_body_missing(parameter),
                            )?;
                        } else {
                            failures.fail(
                                BindingEvent::RequiredParameterNotProvided,
                                diagnostics::required_missing(parameter, "body"),
                            )?;
                        }
                    }
                }
                BodyRead::Stop => return Ok(Flow::Stop),
            }
            return Ok(Flow::Continue);
        }

        let Some(first) = slots.iter().find(|slot| slot.source.is_form()) else {
            return Ok(Flow::Continue);
        };
        let collection =
            match body::read_form(ctx, self.form_reader.as_ref(), &first.descriptor, failures)
                .await?
            {
                BodyRead::Read(collection) => collection,
                BodyRead::Empty => FormCollection::default(),
                BodyRead::Stop => return Ok(Flow::Stop),
            };

        for (index, slot) in slots.iter().enumerate() {
            let parameter = &slot.descriptor;
            values[index] = match &slot.source {
                ResolvedSource::FormCollection => Some(bound(collection.clone())),
                ResolvedSource::FormFiles => Some(bound(collection.files().clone())),
                ResolvedSource::FormFile(name) => {
                    let file = collection.files().get(name).cloned();
                    if file.is_none() && !parameter.is_optional(self.nullability_tracking) {
                        failures.fail(
                            BindingEvent::RequiredParameterNotProvided,
                            diagnostics::required_missing(parameter, "form"),
                        )?;
                    }
                    file.map(bound)
                }
                _ => continue,
            };
        }
        *form = Some(collection);
        Ok(Flow::Continue)
    }

    /// Phase 3.
    fn bind_text(
        &self,
        ctx: &HttpContext,
        slot: &ClassifiedParameter,
        form: Option<&FormCollection>,
        failures: &mut Failures,
    ) -> PipelineResult<Option<BoundValue>> {
        let Some(parser) = &slot.parser else {
            return Ok(None);
        };
        let request = ctx.request();
        let raw: Option<&[String]> = match &slot.source {
            ResolvedSource::RouteValue(key) => request.route_values().get(key),
            ResolvedSource::QueryValue(key) => request.query().get(key),
            ResolvedSource::HeaderValue(key) => request.headers().get(key),
            ResolvedSource::RouteOrQuery(key) => request
                .route_values()
                .get(key)
                .or_else(|| request.query().get(key)),
            ResolvedSource::FormValue(key) => form.and_then(|form| form.get(key)),
            _ => return Ok(None),
        };
        let parameter = &slot.descriptor;

        if let TextParser::Sequence { sequence, .. } = parser {
            let raw = raw.unwrap_or_default();
            if raw.is_empty() && parameter.is_nullable() {
                return Ok(None);
            }
            let mut elements = Vec::with_capacity(raw.len());
            let mut failed = false;
            for text in raw {
                match parser.parse(text) {
                    Some(element) => elements.push(element),
                    None => {
                        failed = true;
                        failures.fail(
                            BindingEvent::ParameterBindingFailed,
                            diagnostics::binding_failed(parameter, text),
                        )?;
                    }
                }
            }
            if failed {
                return Ok(None);
            }
            return Ok(Some(sequence.collect(elements)?));
        }

        let optional = parameter.is_optional(self.nullability_tracking);
        let Some(text) = raw.map(|values| values.join(",")) else {
            if !optional {
                failures.fail(
                    BindingEvent::RequiredParameterNotProvided,
                    diagnostics::required_missing(parameter, &slot.source.describe()),
                )?;
            }
            return Ok(None);
        };
        // Empty text leaves an optional parsed value unset; a required one
        // still goes through the parser and fails with the raw text.
        if text.is_empty() && parser.empty_is_missing() && optional {
            return Ok(None);
        }
        match parser.parse(&text) {
            Some(value) => Ok(Some(value)),
            None => {
                failures.fail(
                    BindingEvent::ParameterBindingFailed,
                    diagnostics::binding_failed(parameter, &text),
                )?;
                Ok(None)
            }
        }
    }
}

fn is_credentialed(ctx: &HttpContext) -> bool {
    let request = ctx.request();
    request.has_bearer_authorization() || request.client_certificate().is_some()
}

fn special(ctx: &HttpContext, kind: SpecialKind) -> Option<BoundValue> {
    let request = ctx.request();
    Some(match kind {
        SpecialKind::Context => bound(ctx.clone()),
        SpecialKind::Request => bound(request.clone()),
        SpecialKind::Response => bound(ctx.response().clone()),
        SpecialKind::Cancellation => bound(ctx.request_aborted().clone()),
        SpecialKind::User => bound(ctx.user().clone()),
        SpecialKind::TraceIdentifier => bound(ctx.trace_identifier().clone()),
        SpecialKind::BodyStream => bound(RequestBody::new(request.clone())),
        SpecialKind::FormCollection | SpecialKind::FormFile | SpecialKind::FormFileCollection => {
            return None;
        }
    })
}
