//! Model nodes, the model tree projection and tree-wide reparametrization.
//!
//! A model is a node with an ordered attribute list. Each attribute is either
//! a primitive [`ParamValue`] or a shared reference to another model (a
//! submodel). Submodels are held as `Arc<RwLock<_>>` so that one instance
//! can hang off several parents and an update through any path is seen by
//! all of them.

use parking_lot::RwLock;
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

use crate::calibrator::ErasedCalibrator;
use crate::errors::{MgError, MgResult};
use crate::params::{ParamValue, Params};
use crate::sink::{RunSink, SavedRun};
use crate::tree::{Tree, TreeNode};

/// Attributes whose name starts with this prefix are private: they are never
/// reparametrized and private submodels are not traversed.
pub const PRIVATE_PREFIX: &str = "_";

pub fn is_private(name: &str) -> bool {
    name.starts_with(PRIVATE_PREFIX)
}

/// Shared handle to a concrete model.
pub type Shared<M> = Arc<RwLock<M>>;

/// Shared handle to any model node.
pub type SharedNode = Arc<RwLock<dyn Node>>;

pub fn shared<M: Node + 'static>(model: M) -> Shared<M> {
    Arc::new(RwLock::new(model))
}

/// The value of one model attribute.
#[derive(Debug, Clone)]
pub enum Attribute {
    Param(ParamValue),
    Submodel(SharedNode),
}

impl Attribute {
    pub fn param(value: impl Into<ParamValue>) -> Self {
        Self::Param(value.into())
    }

    pub fn submodel<M: Node + 'static>(model: &Shared<M>) -> Self {
        Self::Submodel(model.clone())
    }

    pub fn is_submodel(&self) -> bool {
        matches!(self, Self::Submodel(_))
    }
}

/// Structural side of a model: what it holds and how its parameters change.
pub trait Node: Send + Sync + std::fmt::Debug {
    /// Human-readable type name, used in run labels and error messages.
    fn type_name(&self) -> &str;

    /// Every attribute in declaration order.
    fn attributes(&self) -> Vec<(String, Attribute)>;

    /// Store a primitive parameter. Called by [`Node::set_parameter`] after
    /// it has checked that `name` does not hold a submodel.
    fn store_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()>;

    /// Calibrators report themselves here so owners can discover them among
    /// their submodels.
    fn as_calibrator(&self) -> Option<&dyn ErasedCalibrator> {
        None
    }

    fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, attribute)| attribute)
    }

    /// Overwrite a primitive parameter. Submodel-typed attributes are
    /// rejected.
    fn set_parameter(&mut self, name: &str, value: ParamValue) -> MgResult<()> {
        if let Some(Attribute::Submodel(_)) = self.attribute(name) {
            return Err(MgError::unsupported(format!(
                "overwriting submodel `{name}` of {} with a parameter",
                self.type_name()
            )));
        }
        self.store_parameter(name, value)
    }

    /// Structural replacement of a submodel is not supported.
    fn replace_submodel(&mut self, name: &str, _model: SharedNode) -> MgResult<()> {
        Err(MgError::unsupported(format!(
            "replacing submodel `{name}` of {}",
            self.type_name()
        )))
    }

    /// Immediate, non-private submodels in declaration order.
    fn submodels(&self) -> Vec<(String, SharedNode)> {
        self.attributes()
            .into_iter()
            .filter_map(|(name, attribute)| match attribute {
                Attribute::Submodel(node) if !is_private(&name) => Some((name, node)),
                _ => None,
            })
            .collect()
    }

    /// Nested projection of the current attribute values, submodels
    /// expanded. Recomputed on every call.
    fn model_tree(&self) -> MgResult<Tree<ParamValue>> {
        let mut path = Vec::new();
        let mut ancestors = vec![node_address(self)];
        project(self, &mut path, &mut ancestors)
    }

    /// Set every non-private parameter whose name is a key of `updates`,
    /// wherever it sits in the tree. Returns a shadow of
    /// [`Node::model_tree`] marking the leaves that were written.
    fn reparam(&mut self, updates: &Params) -> MgResult<Tree<bool>> {
        let tree = self.model_tree()?;
        tree.try_walk(|_, path| -> MgResult<bool> {
            let Some((name, parents)) = path.split_last() else {
                return Ok(false);
            };
            let value = match updates.get(name) {
                Some(value) if !is_private(name) => value.clone(),
                _ => return Ok(false),
            };
            debug!("reparam {} = {}", path.join("."), value);
            if parents.is_empty() {
                self.set_parameter(name, value)?;
            } else {
                let holder = resolve(&*self, parents, path)?;
                holder.write().set_parameter(name, value)?;
            }
            Ok(true)
        })
    }
}

/// Invocation side of a model.
pub trait Model: Node {
    type Input: 'static;
    type Output;

    fn invoke(&self, input: &Self::Input) -> MgResult<Self::Output>;

    /// Ask every immediate calibrator for proposals, merge them in
    /// declaration order (later calibrators win on shared keys) and apply
    /// the result with [`Node::reparam`]. Returns the merged updates.
    fn calibrate(&mut self, input: &Self::Input) -> MgResult<Params>
    where
        Self: Sized,
    {
        let mut merged = Params::new();
        for (name, submodel) in self.submodels() {
            let guard = submodel.read();
            if let Some(calibrator) = guard.as_calibrator() {
                let proposal = calibrator.propose_erased(&*self, input as &dyn Any)?;
                debug!("calibrator `{}` on {} proposed {}", name, self.type_name(), proposal);
                merged.merge(proposal);
            }
        }
        if !merged.is_empty() {
            self.reparam(&merged)?;
        }
        Ok(merged)
    }

    /// Calibrate, then invoke. Plain [`Model::invoke`] never calibrates.
    fn run(&mut self, input: &Self::Input) -> MgResult<Self::Output>
    where
        Self: Sized,
    {
        self.calibrate(input)?;
        self.invoke(input)
    }

    /// [`Model::run`], then hand the model and its output to `sink`.
    fn run_and_save(
        &mut self,
        input: &Self::Input,
        sink: &dyn RunSink,
    ) -> MgResult<(Self::Output, SavedRun)>
    where
        Self: Sized,
        Self::Output: Serialize,
    {
        let output = self.run(input)?;
        let blob = serde_json::to_vec(&output)?;
        let saved = sink.persist(&*self, &blob)?;
        Ok((output, saved))
    }
}

/// Construction from named parameters.
pub trait FromParams: Sized {
    fn from_params(params: &Params) -> MgResult<Self>;
}

fn node_address<N: Node + ?Sized>(node: &N) -> usize {
    node as *const N as *const () as usize
}

fn project<N: Node + ?Sized>(
    node: &N,
    path: &mut Vec<String>,
    ancestors: &mut Vec<usize>,
) -> MgResult<Tree<ParamValue>> {
    let mut tree = Tree::new();
    for (name, attribute) in node.attributes() {
        match attribute {
            Attribute::Param(value) => tree.push(name, TreeNode::Leaf(value)),
            Attribute::Submodel(_) if is_private(&name) => {}
            Attribute::Submodel(child) => {
                path.push(name.clone());
                let address = child.data_ptr() as *const () as usize;
                if ancestors.contains(&address) {
                    return Err(MgError::CycleDetected { path: path.clone() });
                }
                ancestors.push(address);
                let subtree = project(&*child.read(), path, ancestors);
                ancestors.pop();
                path.pop();
                tree.push(name, TreeNode::Branch(subtree?));
            }
        }
    }
    Ok(tree)
}

/// Follow submodel references from `root` along `parents`.
fn resolve<N: Node + ?Sized>(root: &N, parents: &[String], path: &[String]) -> MgResult<SharedNode> {
    let stale = || MgError::StaleReference {
        path: path.to_vec(),
    };
    let (first, rest) = parents.split_first().ok_or_else(stale)?;
    let mut current = match root.attribute(first) {
        Some(Attribute::Submodel(node)) => node,
        _ => return Err(stale()),
    };
    for name in rest {
        let next = match current.read().attribute(name) {
            Some(Attribute::Submodel(node)) => node,
            _ => return Err(stale()),
        };
        current = next;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use crate::testing::{Bar, CalibratedFoo, Foo, NestedModel, PrivateHolder, Pair};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Reports its submodel only on the first `attributes()` call; later
    /// calls show a primitive under the same name.
    #[derive(Debug)]
    struct Vanishing {
        model: Shared<Foo>,
        listed: AtomicBool,
    }

    impl Node for Vanishing {
        fn type_name(&self) -> &str {
            "Vanishing"
        }

        fn attributes(&self) -> Vec<(String, Attribute)> {
            if self.listed.swap(true, Ordering::SeqCst) {
                vec![("model".to_string(), Attribute::param(0.0))]
            } else {
                vec![("model".to_string(), Attribute::submodel(&self.model))]
            }
        }

        fn store_parameter(&mut self, name: &str, _value: ParamValue) -> MgResult<()> {
            Err(MgError::unknown_parameter("Vanishing", name))
        }
    }

    #[test]
    fn foo_takes_the_max() {
        let foo = Foo::new(3.0);
        assert_eq!(foo.invoke(&5.0).unwrap(), 5.0);
        assert_eq!(foo.invoke(&2.0).unwrap(), 3.0);
    }

    #[test]
    fn from_params_requires_every_parameter() {
        let err = Foo::from_params(&Params::new()).unwrap_err();
        assert!(matches!(err, MgError::MissingParameter { ref parameter, .. } if parameter == "parameter"));

        let err = Bar::from_params(&params! { "number" => 1 }).unwrap_err();
        assert!(matches!(err, MgError::MissingParameter { .. }));
    }

    #[test]
    fn model_tree_expands_submodels() {
        let model = NestedModel::new(5.0, Foo::new(3.0));
        let tree = model.model_tree().unwrap();

        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["alpha", "model"]);
        assert_eq!(
            tree.get_path(&["model", "parameter"]).and_then(TreeNode::as_leaf),
            Some(&ParamValue::Float(3.0))
        );
    }

    #[test]
    fn model_tree_reflects_live_state() {
        let model = NestedModel::new(5.0, Foo::new(3.0));
        model.inner().write().set_parameter("parameter", 9.0.into()).unwrap();

        let tree = model.model_tree().unwrap();
        assert_eq!(
            tree.get_path(&["model", "parameter"]).and_then(TreeNode::as_leaf),
            Some(&ParamValue::Float(9.0))
        );
    }

    #[test]
    fn reparam_updates_nested_parameter() {
        let mut model = NestedModel::new(5.0, Foo::new(3.0));
        let shadow = model.reparam(&params! { "parameter" => 5.0 }).unwrap();

        assert_eq!(model.inner().read().parameter(), 5.0);
        assert_eq!(model.alpha(), 5.0);
        let expected = Tree::new()
            .with_leaf("alpha", false)
            .with_branch("model", Tree::new().with_leaf("parameter", true));
        assert_eq!(shadow, expected);
    }

    #[test]
    fn reparam_reaches_every_occurrence() {
        let mut pair = Pair::new(
            1.0,
            NestedModel::new(2.0, Foo::new(3.0)),
            Foo::new(4.0),
        );
        let shadow = pair.reparam(&params! { "parameter" => 10.0 }).unwrap();

        let marked: Vec<_> = shadow
            .leaves()
            .into_iter()
            .filter(|(_, flag)| **flag)
            .map(|(path, _)| path.join("."))
            .collect();
        assert_eq!(marked, vec!["parameter", "left.model.parameter", "right.parameter"]);
        assert_eq!(pair.parameter(), 10.0);
        assert_eq!(pair.left().read().inner().read().parameter(), 10.0);
        assert_eq!(pair.right().read().parameter(), 10.0);
        assert_eq!(pair.left().read().alpha(), 2.0);
    }

    #[test]
    fn reparam_through_shared_submodel_is_visible_to_every_parent() {
        let foo = shared(Foo::new(1.0));
        let mut first = NestedModel::with_shared(0.0, foo.clone());
        let second = NestedModel::with_shared(0.0, foo.clone());

        first.reparam(&params! { "parameter" => 7.0 }).unwrap();
        assert_eq!(second.inner().read().parameter(), 7.0);
        assert_eq!(second.invoke(&0.0).unwrap(), 7.0);
    }

    #[test]
    fn reparam_skips_private_attributes() {
        let mut holder = PrivateHolder::new(1.0, 2.0, Foo::new(3.0));
        let shadow = holder
            .reparam(&params! { "_secret" => 100.0, "parameter" => 50.0, "visible" => 4.0 })
            .unwrap();

        assert_eq!(holder.secret(), 2.0);
        assert_eq!(holder.hidden().read().parameter(), 3.0);
        assert_eq!(holder.visible(), 4.0);
        assert_eq!(shadow.get("_secret").and_then(TreeNode::as_leaf), Some(&false));
        assert!(shadow.get("_hidden").is_none());
    }

    #[test]
    fn reparam_with_unknown_names_changes_nothing() {
        let mut model = NestedModel::new(5.0, Foo::new(3.0));
        let shadow = model.reparam(&params! { "gamma" => 1.0 }).unwrap();

        assert!(shadow.leaves().iter().all(|(_, flag)| !**flag));
        assert_eq!(model.inner().read().parameter(), 3.0);
    }

    #[test]
    fn overwriting_a_submodel_is_unsupported() {
        let mut model = NestedModel::new(5.0, Foo::new(3.0));

        let err = model.set_parameter("model", 1.0.into()).unwrap_err();
        assert!(matches!(err, MgError::Unsupported { .. }));

        let replacement: SharedNode = shared(Foo::new(1.0));
        let err = model.replace_submodel("model", replacement).unwrap_err();
        assert!(matches!(err, MgError::Unsupported { .. }));

        model.set_parameter("alpha", 6.0.into()).unwrap();
        assert_eq!(model.alpha(), 6.0);
    }

    #[test]
    fn submodels_exclude_private_ones() {
        let holder = PrivateHolder::new(1.0, 2.0, Foo::new(3.0));
        assert!(holder.submodels().is_empty());

        let model = NestedModel::new(5.0, Foo::new(3.0));
        let names: Vec<_> = model.submodels().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["model"]);
    }

    #[test]
    fn cycles_are_reported_instead_of_recursing() {
        let outer = shared(Pair::new(0.0, NestedModel::new(1.0, Foo::new(1.0)), Foo::new(2.0)));
        let back: SharedNode = outer.clone();
        outer.write().set_back_reference(back);

        let err = outer.read().model_tree().unwrap_err();
        assert!(matches!(err, MgError::CycleDetected { ref path } if path == &vec!["back".to_string()]));
    }

    #[test]
    fn reparam_reports_paths_that_stop_resolving() {
        let mut node = Vanishing {
            model: shared(Foo::new(1.0)),
            listed: AtomicBool::new(false),
        };

        let err = node.reparam(&params! { "parameter" => 2.0 }).unwrap_err();
        assert!(matches!(
            err,
            MgError::StaleReference { ref path } if path == &vec!["model".to_string(), "parameter".to_string()]
        ));
        assert_eq!(node.model.read().parameter(), 1.0);
    }

    #[test]
    fn invoke_skips_calibration_but_run_does_not() {
        let mut model = CalibratedFoo::new(0.0, 1.0);
        assert_eq!(model.invoke(&5.0).unwrap(), 5.0);

        assert_eq!(model.run(&5.0).unwrap(), 6.0);
        assert_eq!(model.parameter(), 6.0);
    }

    #[test]
    fn calibrator_proposals_merge_last_writer_wins() {
        let mut model = CalibratedFoo::new(0.0, 1.0).with_second_calibrator(10.0);
        let merged = model.calibrate(&5.0).unwrap();

        assert_eq!(merged.get("parameter"), Some(&ParamValue::Float(15.0)));
        assert_eq!(model.parameter(), 15.0);
    }
}
