//! Parameter source classification.
//!
//! Each handler parameter is bound from exactly one source. Explicit
//! annotations decide first; otherwise the classifier walks a fixed order:
//!
//! 1. framework context types (request, response, abort signal, user, ...)
//!    and the form types;
//! 2. a `bind_async` capability;
//! 3. `String`, `try_parse`-capable types and sequences of them, from the
//!    route or the query string;
//! 4. services;
//! 5. the JSON request body.

use std::fmt;

use conduit_core::http::ServiceProvider;
use conduit_core::model::{SequenceModel, SpecialKind, TypeKind, TypeModel};
use conduit_core::value::bound;
use conduit_core::{BoundValue, CompileError, SourceAnnotation};

use crate::binding::{BindingCandidate, BindingCapabilityResolver, RecordConstruction};
use crate::options::CompileOptions;
use crate::parameter::ParameterDescriptor;

/// Turns raw text into a parameter value.
#[derive(Clone)]
pub enum TextParser {
    /// `String`, taken as-is.
    Text,
    /// A `try_parse` capability.
    Candidate(BindingCandidate),
    /// `Vec<T>`, one element per value.
    Sequence {
        /// The element parser; `None` for `Vec<String>`.
        element: Option<BindingCandidate>,
        /// Collects parsed elements.
        sequence: SequenceModel,
    },
}

impl TextParser {
    /// Returns `true` for sequence parsers.
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence { .. })
    }

    /// Returns `true` if empty text counts as a missing value.
    pub fn empty_is_missing(&self) -> bool {
        matches!(self, Self::Candidate(_))
    }

    /// Parses one scalar value, or one element of a sequence.
    pub fn parse(&self, text: &str) -> Option<BoundValue> {
        match self {
            Self::Text | Self::Sequence { element: None, .. } => Some(bound(text.to_string())),
            Self::Candidate(candidate) | Self::Sequence { element: Some(candidate), .. } => {
                candidate.parse(text)
            }
        }
    }
}

impl fmt::Debug for TextParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("Text"),
            Self::Candidate(candidate) => f.debug_tuple("Candidate").field(candidate).finish(),
            Self::Sequence { element, sequence } => f
                .debug_struct("Sequence")
                .field("element", &sequence.element().name())
                .field("parser", element)
                .finish(),
        }
    }
}

/// A record bound member by member.
#[derive(Debug, Clone)]
pub struct RecordSource {
    /// How the record is built.
    pub construction: RecordConstruction,
    /// Constructor parameters followed by assigned properties.
    pub members: Vec<ClassifiedParameter>,
}

/// Where a parameter's value comes from.
#[derive(Debug, Clone)]
pub enum ResolvedSource {
    /// A route value.
    RouteValue(String),
    /// A query string value.
    QueryValue(String),
    /// A header value.
    HeaderValue(String),
    /// A route value when present, else a query value. Used when the route
    /// parameter names are unknown.
    RouteOrQuery(String),
    /// The JSON request body.
    Body {
        /// Bind `None`/default when the body is empty.
        allow_empty: bool,
        /// `true` when no annotation asked for the body.
        inferred: bool,
    },
    /// A request service.
    Service {
        /// Fail the request when the service is missing.
        required: bool,
    },
    /// A `bind_async` capability.
    BindCapability(BindingCandidate),
    /// A framework context value.
    SpecialContext(SpecialKind),
    /// A form field.
    FormValue(String),
    /// One uploaded file.
    FormFile(String),
    /// Every uploaded file.
    FormFiles,
    /// The whole form.
    FormCollection,
    /// A record expanded into its members.
    Record(Box<RecordSource>),
}

impl ResolvedSource {
    /// Returns `true` for body-bound sources.
    pub fn is_body(&self) -> bool {
        matches!(self, Self::Body { .. })
    }

    /// Returns `true` for form-bound sources.
    pub fn is_form(&self) -> bool {
        matches!(
            self,
            Self::FormValue(_) | Self::FormFile(_) | Self::FormFiles | Self::FormCollection
        )
    }

    /// The source named in "was not provided from" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::RouteValue(_) => "route".into(),
            Self::QueryValue(_) => "query string".into(),
            Self::HeaderValue(_) => "header".into(),
            Self::RouteOrQuery(_) => "route or query string".into(),
            Self::Body { .. } => "body".into(),
            Self::Service { .. } => "services".into(),
            Self::BindCapability(candidate) => candidate.describe(),
            Self::SpecialContext(kind) => format!("{kind:?}"),
            Self::FormValue(_) | Self::FormFile(_) | Self::FormFiles | Self::FormCollection => {
                "form".into()
            }
            Self::Record(record) => format!("{} members", record.members.len()),
        }
    }
}

/// A parameter together with its source.
#[derive(Debug, Clone)]
pub struct ClassifiedParameter {
    /// The parameter.
    pub descriptor: ParameterDescriptor,
    /// Where its value comes from.
    pub source: ResolvedSource,
    /// The text parser, for text-bound sources.
    pub parser: Option<TextParser>,
}

impl ClassifiedParameter {
    fn new(descriptor: &ParameterDescriptor, source: ResolvedSource) -> Self {
        Self {
            descriptor: descriptor.clone(),
            source,
            parser: None,
        }
    }

    fn parsed(descriptor: &ParameterDescriptor, source: ResolvedSource, parser: TextParser) -> Self {
        Self {
            descriptor: descriptor.clone(),
            source,
            parser: Some(parser),
        }
    }

    /// Returns `true` if this parameter or one of its record members binds from a form.
    pub fn uses_form(&self) -> bool {
        match &self.source {
            ResolvedSource::Record(record) => record.members.iter().any(Self::uses_form),
            source => source.is_form(),
        }
    }
}

/// Decides where each handler parameter is bound from.
pub struct ParameterSourceClassifier<'a> {
    resolver: &'a BindingCapabilityResolver,
    route_parameter_names: Option<&'a [String]>,
    services: Option<&'a dyn ServiceProvider>,
}

impl<'a> ParameterSourceClassifier<'a> {
    /// Creates a classifier using `resolver` and the router and service
    /// information in `options`.
    pub fn new(resolver: &'a BindingCapabilityResolver, options: &'a CompileOptions) -> Self {
        Self {
            resolver,
            route_parameter_names: options.route_parameter_names.as_deref(),
            services: options.services.as_deref(),
        }
    }

    /// Classifies one handler parameter.
    pub fn classify(
        &self,
        parameter: &ParameterDescriptor,
    ) -> Result<ClassifiedParameter, CompileError> {
        self.classify_nested(parameter, false)
    }

    fn classify_nested(
        &self,
        parameter: &ParameterDescriptor,
        in_record: bool,
    ) -> Result<ClassifiedParameter, CompileError> {
        let Some(name) = parameter.name() else {
            return Err(CompileError::UnnamedParameter {
                position: parameter.position(),
            });
        };
        let model = parameter.model();

        if let Some(annotation) = parameter.annotation() {
            let key = annotation.name().unwrap_or(name).to_string();
            return match annotation {
                SourceAnnotation::Route { .. } => {
                    if let Some(names) = self.route_parameter_names
                        && !names.iter().any(|n| n.eq_ignore_ascii_case(&key))
                    {
                        return Err(CompileError::UnknownRouteParameter { parameter: key });
                    }
                    let parser = self.required_parser(parameter, &model)?;
                    Ok(ClassifiedParameter::parsed(
                        parameter,
                        ResolvedSource::RouteValue(key),
                        parser,
                    ))
                }
                SourceAnnotation::Query { .. } => {
                    let parser = self.required_parser(parameter, &model)?;
                    Ok(ClassifiedParameter::parsed(
                        parameter,
                        ResolvedSource::QueryValue(key),
                        parser,
                    ))
                }
                SourceAnnotation::Header { .. } => {
                    let parser = self.required_parser(parameter, &model)?;
                    Ok(ClassifiedParameter::parsed(
                        parameter,
                        ResolvedSource::HeaderValue(key),
                        parser,
                    ))
                }
                SourceAnnotation::Body { allow_empty } => {
                    body_decoder(parameter, &model)?;
                    Ok(ClassifiedParameter::new(
                        parameter,
                        ResolvedSource::Body {
                            allow_empty: *allow_empty,
                            inferred: false,
                        },
                    ))
                }
                SourceAnnotation::Service => Ok(ClassifiedParameter::new(
                    parameter,
                    ResolvedSource::Service {
                        required: !parameter.is_optional(true),
                    },
                )),
                SourceAnnotation::Form { name: explicit } => {
                    self.classify_form(parameter, &model, key, explicit.is_some())
                }
                SourceAnnotation::AsParameters => {
                    if in_record {
                        return Err(CompileError::NestedAsParameters {
                            parameter: name.to_string(),
                        });
                    }
                    self.classify_record(parameter, &model)
                }
            };
        }

        if let Some(kind) = model.special() {
            if kind.is_form() {
                return self.classify_form(parameter, &model, name.to_string(), false);
            }
            return Ok(ClassifiedParameter::new(
                parameter,
                ResolvedSource::SpecialContext(kind),
            ));
        }

        if let Some(candidate) = self.resolver.find_bind_async(parameter)? {
            return Ok(ClassifiedParameter::new(
                parameter,
                ResolvedSource::BindCapability(candidate),
            ));
        }

        if let Some(parser) = self.text_parser(&model)? {
            let key = name.to_string();
            let source = match self.route_parameter_names {
                Some(names) if names.iter().any(|n| n.eq_ignore_ascii_case(&key)) => {
                    ResolvedSource::RouteValue(key)
                }
                Some(_) => ResolvedSource::QueryValue(key),
                None => ResolvedSource::RouteOrQuery(key),
            };
            return Ok(ClassifiedParameter::parsed(parameter, source, parser));
        }

        if matches!(model.kind(), TypeKind::Service)
            || self.services.is_some_and(|services| {
                services.is_service(parameter.declared().id()) || services.is_service(model.id())
            })
        {
            return Ok(ClassifiedParameter::new(
                parameter,
                ResolvedSource::Service {
                    required: !parameter.is_optional(true),
                },
            ));
        }

        body_decoder(parameter, &model)?;
        Ok(ClassifiedParameter::new(
            parameter,
            ResolvedSource::Body {
                allow_empty: false,
                inferred: true,
            },
        ))
    }

    fn classify_form(
        &self,
        parameter: &ParameterDescriptor,
        model: &TypeModel,
        key: String,
        explicit_name: bool,
    ) -> Result<ClassifiedParameter, CompileError> {
        let source = match model.special() {
            Some(SpecialKind::FormCollection | SpecialKind::FormFileCollection) if explicit_name => {
                return Err(CompileError::FormNameNotSupported {
                    type_name: model.name().to_string(),
                    parameter: parameter.name().unwrap_or_default().to_string(),
                });
            }
            Some(SpecialKind::FormCollection) => ResolvedSource::FormCollection,
            Some(SpecialKind::FormFileCollection) => ResolvedSource::FormFiles,
            Some(SpecialKind::FormFile) => ResolvedSource::FormFile(key),
            _ => {
                let parser = self.required_parser(parameter, model)?;
                return Ok(ClassifiedParameter::parsed(
                    parameter,
                    ResolvedSource::FormValue(key),
                    parser,
                ));
            }
        };
        Ok(ClassifiedParameter::new(parameter, source))
    }

    fn classify_record(
        &self,
        parameter: &ParameterDescriptor,
        model: &TypeModel,
    ) -> Result<ClassifiedParameter, CompileError> {
        let construction = self.resolver.find_constructor(model)?;
        let members = construction
            .members()
            .iter()
            .enumerate()
            .map(|(position, member)| {
                let member = ParameterDescriptor::from_member(member, position);
                self.classify_nested(&member, true)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ClassifiedParameter::new(
            parameter,
            ResolvedSource::Record(Box::new(RecordSource {
                construction,
                members,
            })),
        ))
    }

    /// The text parser for `model`: `String`, a `try_parse` type, or a
    /// sequence of either.
    fn text_parser(&self, model: &TypeModel) -> Result<Option<TextParser>, CompileError> {
        if model.is_text() {
            return Ok(Some(TextParser::Text));
        }
        if let Some(sequence) = model.sequence() {
            let element = sequence.element();
            if element.is_text() {
                return Ok(Some(TextParser::Sequence {
                    element: None,
                    sequence: sequence.clone(),
                }));
            }
            return Ok(self
                .resolver
                .find_try_parse(element)?
                .map(|candidate| TextParser::Sequence {
                    element: Some(candidate),
                    sequence: sequence.clone(),
                }));
        }
        Ok(self.resolver.find_try_parse(model)?.map(TextParser::Candidate))
    }

    fn required_parser(
        &self,
        parameter: &ParameterDescriptor,
        model: &TypeModel,
    ) -> Result<TextParser, CompileError> {
        self.text_parser(model)?
            .ok_or_else(|| CompileError::MissingTryParse {
                type_name: model.name().to_string(),
                parameter: parameter.name().unwrap_or_default().to_string(),
            })
    }
}

fn body_decoder(parameter: &ParameterDescriptor, model: &TypeModel) -> Result<(), CompileError> {
    if model.has_json() {
        Ok(())
    } else {
        Err(CompileError::NoBodyDecoder {
            type_name: model.name().to_string(),
            parameter: parameter.name().unwrap_or_default().to_string(),
        })
    }
}
