//! Argument layout of a compiled pipeline.
//!
//! Binding works on a flat list of slots, one per leaf value. Records bound
//! with `AsParameters` contribute one slot per member, in member order,
//! directly after the slots of the parameters declared before them. After
//! binding, the slots are folded back into one argument per handler parameter.

use conduit_core::{Arguments, BindError, BoundValue};

use crate::binding::RecordConstruction;
use crate::parameter::ParameterDescriptor;
use crate::source::{ClassifiedParameter, ResolvedSource};

/// How one handler argument is produced from the slots.
#[derive(Debug, Clone)]
pub(crate) enum ArgumentPlan {
    /// Taken from a single slot.
    Slot(usize),
    /// A record assembled from member plans.
    Record {
        descriptor: ParameterDescriptor,
        construction: RecordConstruction,
        members: Vec<ArgumentPlan>,
    },
}

/// Slots to bind plus the recipe for turning them into handler arguments.
#[derive(Debug, Clone)]
pub(crate) struct BindingPlan {
    parameters: Vec<ClassifiedParameter>,
    slots: Vec<ClassifiedParameter>,
    arguments: Vec<ArgumentPlan>,
}

impl BindingPlan {
    pub(crate) fn new(parameters: Vec<ClassifiedParameter>) -> Self {
        let mut slots = Vec::new();
        let arguments = parameters
            .iter()
            .map(|parameter| flatten(parameter, &mut slots))
            .collect();
        Self {
            parameters,
            slots,
            arguments,
        }
    }

    /// The classified handler parameters, records unexpanded.
    pub(crate) fn parameters(&self) -> &[ClassifiedParameter] {
        &self.parameters
    }

    /// Every leaf value to bind, depth first.
    pub(crate) fn slots(&self) -> &[ClassifiedParameter] {
        &self.slots
    }

    /// Folds bound slot values into handler arguments.
    ///
    /// `values` holds one entry per slot; `None` means nothing was bound and
    /// the parameter's default, `None` or type default applies.
    pub(crate) fn assemble(
        &self,
        mut values: Vec<Option<BoundValue>>,
        nullability_tracking: bool,
    ) -> Result<Arguments, BindError> {
        let arguments = self
            .arguments
            .iter()
            .map(|plan| self.build(plan, &mut values, nullability_tracking))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arguments::new(arguments))
    }

    fn build(
        &self,
        plan: &ArgumentPlan,
        values: &mut [Option<BoundValue>],
        nullability_tracking: bool,
    ) -> Result<BoundValue, BindError> {
        match plan {
            ArgumentPlan::Slot(index) => {
                let value = values.get_mut(*index).and_then(Option::take);
                self.slots[*index]
                    .descriptor
                    .finalize(value, nullability_tracking)
            }
            ArgumentPlan::Record {
                descriptor,
                construction,
                members,
            } => {
                let arity = construction.constructor().parameters().len();
                let (ctor_members, property_members) = members.split_at(arity);

                let ctor_args = ctor_members
                    .iter()
                    .map(|member| self.build(member, values, nullability_tracking))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut record = construction.constructor().construct(Arguments::new(ctor_args))?;

                for (property, member) in construction.properties().iter().zip(property_members) {
                    if let Some(value) = self.take_member(member, values, nullability_tracking)? {
                        property.assign(&mut record, value)?;
                    }
                }
                descriptor.finalize(Some(record), nullability_tracking)
            }
        }
    }

    /// A property value, or `None` to keep whatever the constructor set.
    fn take_member(
        &self,
        plan: &ArgumentPlan,
        values: &mut [Option<BoundValue>],
        nullability_tracking: bool,
    ) -> Result<Option<BoundValue>, BindError> {
        match plan {
            ArgumentPlan::Slot(index) => match values.get_mut(*index).and_then(Option::take) {
                Some(value) => self.slots[*index]
                    .descriptor
                    .finalize(Some(value), nullability_tracking)
                    .map(Some),
                None => Ok(None),
            },
            record @ ArgumentPlan::Record { .. } => {
                self.build(record, values, nullability_tracking).map(Some)
            }
        }
    }
}

fn flatten(parameter: &ClassifiedParameter, slots: &mut Vec<ClassifiedParameter>) -> ArgumentPlan {
    match &parameter.source {
        ResolvedSource::Record(record) => ArgumentPlan::Record {
            descriptor: parameter.descriptor.clone(),
            construction: record.construction.clone(),
            members: record
                .members
                .iter()
                .map(|member| flatten(member, slots))
                .collect(),
        },
        _ => {
            slots.push(parameter.clone());
            ArgumentPlan::Slot(slots.len() - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use conduit_core::model::{MemberDecl, TypeModel};
    use conduit_core::value::bound;
    use conduit_core::{Bindable, SourceAnnotation};

    use super::*;
    use crate::binding::{BindingCapabilityResolver, CapabilityCache};
    use crate::options::CompileOptions;
    use crate::source::ParameterSourceClassifier;

    #[derive(Debug, Default, PartialEq)]
    struct Paging {
        page: i32,
        size: Option<i32>,
    }

    impl Bindable for Paging {
        fn type_model() -> TypeModel {
            TypeModel::object::<Paging>()
                .constructor(vec![], |_| {
                    Ok(Paging {
                        page: 1,
                        size: Some(20),
                    })
                })
                .settable("page", |p: &mut Paging, v: i32| p.page = v)
                .settable("size", |p: &mut Paging, v: Option<i32>| p.size = v)
                .build()
        }
    }

    #[derive(Debug, PartialEq)]
    struct Span {
        from: i64,
        to: i64,
    }

    impl Bindable for Span {
        fn type_model() -> TypeModel {
            TypeModel::object::<Span>()
                .constructor(
                    vec![MemberDecl::of::<i64>("from"), MemberDecl::of::<i64>("to")],
                    |mut args| {
                        Ok(Span {
                            from: args.next()?,
                            to: args.next()?,
                        })
                    },
                )
                .settable("from", |s: &mut Span, v: i64| s.from = v)
                .settable("to", |s: &mut Span, v: i64| s.to = v)
                .build()
        }
    }

    fn plan(parameters: Vec<ParameterDescriptor>) -> BindingPlan {
        let options = CompileOptions::new().cache(Arc::new(CapabilityCache::new()));
        let resolver = BindingCapabilityResolver::with_cache(options.binding, options.cache.clone());
        let classifier = ParameterSourceClassifier::new(&resolver, &options);
        BindingPlan::new(
            parameters
                .iter()
                .map(|p| classifier.classify(p).unwrap())
                .collect(),
        )
    }

    #[test]
    fn test_records_flatten_in_order() {
        let plan = plan(vec![
            ParameterDescriptor::of::<String>().named("q"),
            ParameterDescriptor::of::<Paging>()
                .named("paging")
                .annotated(SourceAnnotation::AsParameters),
            ParameterDescriptor::of::<bool>().named("verbose").at(2),
        ]);
        let names: Vec<_> = plan
            .slots()
            .iter()
            .map(|s| s.descriptor.name().unwrap().to_string())
            .collect();
        assert_eq!(names, ["q", "page", "size", "verbose"]);
        assert_eq!(plan.parameters().len(), 3);
    }

    #[test]
    fn test_assemble_keeps_constructor_values_for_unbound_properties() {
        let plan = plan(vec![
            ParameterDescriptor::of::<Paging>()
                .named("paging")
                .annotated(SourceAnnotation::AsParameters),
        ]);
        let mut args = plan.assemble(vec![Some(bound(3_i32)), None], true).unwrap();
        assert_eq!(
            args.next::<Paging>().unwrap(),
            Paging {
                page: 3,
                size: Some(20)
            }
        );
    }

    #[test]
    fn test_assemble_parameterized_record() {
        let plan = plan(vec![
            ParameterDescriptor::of::<Span>()
                .named("span")
                .annotated(SourceAnnotation::AsParameters),
            ParameterDescriptor::of::<Option<String>>().named("label").at(1),
        ]);
        let mut args = plan
            .assemble(vec![Some(bound(1_i64)), Some(bound(9_i64)), None], true)
            .unwrap();
        assert_eq!(args.next::<Span>().unwrap(), Span { from: 1, to: 9 });
        assert_eq!(args.next::<Option<String>>().unwrap(), None);
    }
}
