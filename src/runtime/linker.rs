//! The class linker.
//!
//! [`Linker`] drives the dispatch table builders over a [`ClassRegistry`]. Linking a class
//! first links its superclass and its local interfaces, then builds and installs the
//! class's vtable and itable under the class's init lock. Batches are linked level by
//! level, with the classes of one level processed in parallel.
//!
//! Redefinition ([`Linker::redefine_class`]) is exclusive with linking: it takes the
//! linker's pause lock for writing, resolves the replacement of every affected table entry,
//! then swaps the holder's method list and patches the tables of every linked class before
//! anything else can observe them.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use vmdispatch::prelude::*;
//!
//! let registry = Arc::new(ClassRegistry::new());
//! let object = ClassBuilder::new("java/lang/Object")
//!     .public()
//!     .method(MethodSpec::new("toString", "()Ljava/lang/String;").public())
//!     .build(&registry)?;
//! let runnable = ClassBuilder::new("java/lang/Runnable")
//!     .interface()
//!     .method(MethodSpec::new("run", "()V").public().abstract_())
//!     .build(&registry)?;
//! let task = ClassBuilder::new("app/Task")
//!     .extends(&object)
//!     .implements(&runnable)
//!     .method(MethodSpec::new("run", "()V").public())
//!     .build(&registry)?;
//!
//! let linker = Linker::new(registry.clone())
//!     .with_config(LinkerConfig::default().with_base_vtable_length(Some(1)));
//! linker.link_all(&registry.all_classes())?;
//!
//! let selected = task.itable().unwrap().select(&task, &runnable, 0)?;
//! assert!(selected.is_held_by(&task));
//! println!("{}", linker.statistics());
//! # Ok::<(), vmdispatch::Error>(())
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock},
};

use rayon::prelude::*;

use crate::{
    runtime::{
        config::LinkerConfig,
        constraints::{LoaderConstraints, NoLoaderConstraints},
        diagnostics::{DiagnosticCategory, Diagnostics},
        dispatch::{
            itable,
            revision::{self, TableAdjustments},
            vtable, LinkContext,
        },
        method::{DispatchIndex, Method, MethodRc, RevisionState},
        resolution::{HierarchyResolver, MethodResolver},
        statistics::LinkStatistics,
        token::Token,
        typesystem::{Class, ClassRc, ClassRegistry, LinkedTables, MethodSpec},
    },
    Error, Result,
};

/// Outcome of a successful [`Linker::redefine_class`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedefinitionReport {
    /// Name of the redefined class
    pub class: String,
    /// Replaced bodies with an identical replacement
    pub old: usize,
    /// Replaced bodies whose replacement differs
    pub obsolete: usize,
    /// Non-virtual methods removed by the redefinition
    pub deleted: usize,
    /// Non-virtual methods added by the redefinition
    pub added: usize,
    /// Table entries rewritten across all classes
    pub entries_adjusted: usize,
}

/// Links classes and maintains their dispatch tables.
pub struct Linker {
    registry: Arc<ClassRegistry>,
    config: LinkerConfig,
    constraints: Arc<dyn LoaderConstraints>,
    resolver: Arc<dyn MethodResolver>,
    diagnostics: Arc<Diagnostics>,
    statistics: Arc<LinkStatistics>,
    /// Shared by linking, exclusive for redefinition
    pause: RwLock<()>,
}

impl Linker {
    /// Create a linker over `registry` with the default configuration, no loader
    /// constraints and the hierarchy resolver.
    #[must_use]
    pub fn new(registry: Arc<ClassRegistry>) -> Self {
        Linker {
            registry,
            config: LinkerConfig::default(),
            constraints: Arc::new(NoLoaderConstraints),
            resolver: Arc::new(HierarchyResolver),
            diagnostics: Arc::new(Diagnostics::new()),
            statistics: Arc::new(LinkStatistics::new()),
            pause: RwLock::new(()),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: LinkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the loader-compatibility collaborator
    #[must_use]
    pub fn with_constraints(mut self, constraints: Arc<dyn LoaderConstraints>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Replace the method lookup collaborator
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn MethodResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Report into a shared diagnostics sink
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Count into shared statistics
    #[must_use]
    pub fn with_statistics(mut self, statistics: Arc<LinkStatistics>) -> Self {
        self.statistics = statistics;
        self
    }

    /// The registry this linker works on
    #[must_use]
    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// The diagnostics sink
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// The running statistics
    #[must_use]
    pub fn statistics(&self) -> &Arc<LinkStatistics> {
        &self.statistics
    }

    /// The builder context for this linker's collaborators
    #[must_use]
    pub fn context(&self) -> LinkContext<'_> {
        LinkContext::new(
            &self.registry,
            &self.config,
            self.constraints.as_ref(),
            self.resolver.as_ref(),
            &self.diagnostics,
        )
    }

    /// Link `class`, linking its superclass and interfaces first.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyLinked`] if `class` already has tables, and any error raised
    /// while building the tables of `class` or one of its supertypes. A class whose build
    /// fails is left unlinked.
    pub fn link_class(&self, class: &ClassRc) -> Result<()> {
        let _pause = read_lock!(self.pause);
        if class.is_linked() {
            return Err(Error::AlreadyLinked(class.name.clone()));
        }

        self.link_class_impl(class, 0).inspect_err(|error| {
            self.diagnostics.error(
                DiagnosticCategory::General,
                format!("linking {} failed: {}", class.name, error),
            );
        })
    }

    /// Link every unlinked class of `classes`.
    ///
    /// Classes are grouped by the number of unlinked supertypes above them; each group is
    /// linked in parallel once the previous groups are done. Returns the number of classes
    /// of the batch that were linked.
    ///
    /// # Errors
    /// Returns the first error raised by any class of a group; later groups are not started.
    pub fn link_all(&self, classes: &[ClassRc]) -> Result<usize> {
        let _pause = read_lock!(self.pause);

        let mut depths = HashMap::new();
        let mut scheduled = HashSet::new();
        let mut levels: Vec<Vec<&ClassRc>> = Vec::new();
        for class in classes {
            if class.is_linked() || !scheduled.insert(class.token) {
                continue;
            }
            let depth = self.pending_depth(class, &mut depths, 0)?;
            if levels.len() <= depth {
                levels.resize_with(depth + 1, Vec::new);
            }
            levels[depth].push(class);
        }

        let mut linked = 0;
        for level in levels {
            let results: Vec<Result<()>> = level
                .par_iter()
                .map(|class| self.link_class_impl(class, 0))
                .collect();

            for result in results {
                result?;
            }
            linked += level.len();
        }

        Ok(linked)
    }

    /// Number of unlinked supertypes stacked above `class`
    fn pending_depth(
        &self,
        class: &Class,
        depths: &mut HashMap<Token, usize>,
        nesting: usize,
    ) -> Result<usize> {
        if nesting > self.config.max_hierarchy_depth {
            return Err(Error::HierarchyTooDeep(self.config.max_hierarchy_depth));
        }
        if let Some(depth) = depths.get(&class.token) {
            return Ok(*depth);
        }

        let mut depth = 0;
        for parent in class.super_class.iter().chain(class.local_interfaces.iter()) {
            if !parent.is_linked() {
                depth = depth.max(self.pending_depth(parent, depths, nesting + 1)? + 1);
            }
        }
        depths.insert(class.token, depth);
        Ok(depth)
    }

    fn link_class_impl(&self, class: &ClassRc, depth: usize) -> Result<()> {
        if depth > self.config.max_hierarchy_depth {
            return Err(Error::HierarchyTooDeep(self.config.max_hierarchy_depth));
        }
        if class.is_linked() {
            return Ok(());
        }

        if let Some(parent) = &class.super_class {
            self.link_class_impl(parent, depth + 1)?;
        }
        for interface in &class.local_interfaces {
            self.link_class_impl(interface, depth + 1)?;
        }

        let _guard = lock!(class.init_lock);
        if class.is_linked() {
            return Ok(());
        }

        let ctx = self.context();
        let size = vtable::compute_vtable_size(&ctx, class)?;
        let layout = vtable::build_vtable(&ctx, class, &size)?;
        let itable = itable::build_itable(&ctx, class)?;

        self.statistics.record_class(
            layout.table.len(),
            layout.mirandas.len(),
            itable.size_in_words(),
        );
        ctx.trace(
            self.config.trace_vtables || self.config.trace_itables,
            DiagnosticCategory::General,
            "linked",
            |d| {
                d.with_class(&class.name)
                    .with_index(layout.table.len())
                    .with_flags(format!("{:?}", class.flags))
            },
        );

        class.install_tables(LinkedTables {
            vtable: layout.table,
            default_vtable_indices: layout.default_vtable_indices,
            mirandas: layout.mirandas,
            itable,
        })
    }

    /// Replace the methods of a linked class and patch every table referencing them.
    ///
    /// Methods are matched to the previous declarations by name and signature and keep
    /// their `idnum` and dispatch index. A replaced body becomes [`RevisionState::Old`] when
    /// the replacement has the same code and [`RevisionState::Obsolete`] otherwise; a
    /// removed non-virtual method becomes [`RevisionState::Deleted`].
    ///
    /// ## Arguments
    /// * `holder`  - The class to redefine
    /// * `methods` - The complete new method list
    ///
    /// # Errors
    /// Returns [`Error::NotLinked`] for an unlinked holder,
    /// [`Error::IncompatibleRedefinition`] if the new list adds or removes a virtual
    /// method, changes a method's access or staticness, or declares a method twice, and
    /// [`Error::RetiredMethod`] if a table entry has no replacement. Every check runs before
    /// the holder or any table changes, so a failed call leaves both as they were.
    pub fn redefine_class(
        &self,
        holder: &ClassRc,
        methods: Vec<MethodSpec>,
    ) -> Result<RedefinitionReport> {
        let _pause = write_lock!(self.pause);
        if !holder.is_linked() {
            return Err(Error::NotLinked(holder.name.clone()));
        }

        let incompatible = |message: String| Error::IncompatibleRedefinition {
            class: holder.name.clone(),
            message,
        };

        let old_methods = holder.methods();
        let mut next_idnum = old_methods
            .iter()
            .map(|method| u32::from(method.idnum))
            .max()
            .map_or(0, |idnum| idnum + 1);

        let mut report = RedefinitionReport {
            class: holder.name.clone(),
            ..RedefinitionReport::default()
        };
        let mut pairs: Vec<(MethodRc, Option<MethodRc>)> = Vec::with_capacity(methods.len());
        for declared in methods {
            if pairs
                .iter()
                .any(|(new, _)| new.matches(&declared.name, &declared.signature))
            {
                return Err(incompatible(format!(
                    "{}{} is declared twice",
                    declared.name, declared.signature
                )));
            }

            let previous = old_methods
                .iter()
                .find(|method| method.matches(&declared.name, &declared.signature))
                .cloned();
            let idnum = match &previous {
                Some(method) => method.idnum,
                None => {
                    let idnum = u16::try_from(next_idnum).map_err(|_| {
                        incompatible(format!(
                            "no idnum left for {}{}",
                            declared.name, declared.signature
                        ))
                    })?;
                    next_idnum += 1;
                    idnum
                }
            };
            let method = Arc::new(declared.into_method(&self.registry, idnum));

            match &previous {
                Some(old) => {
                    if old.flags_access != method.flags_access || old.is_static() != method.is_static() {
                        return Err(incompatible(format!(
                            "{} changes its modifiers",
                            old.display_name()
                        )));
                    }
                    method.set_dispatch_index(old.dispatch_index());
                }
                None => {
                    if would_be_virtual(&method, holder) {
                        return Err(incompatible(format!(
                            "adds virtual method {}",
                            method.name_and_sig()
                        )));
                    }
                    method.set_dispatch_index(DispatchIndex::NonVirtual);
                    report.added += 1;
                }
            }
            pairs.push((method, previous));
        }

        let removed: Vec<&MethodRc> = old_methods
            .iter()
            .filter(|old| !pairs.iter().any(|(new, _)| new.same_identity(old)))
            .collect();
        if let Some(virtual_method) = removed.iter().find(|old| {
            matches!(
                old.dispatch_index(),
                DispatchIndex::Virtual(_) | DispatchIndex::Interface(_)
            )
        }) {
            return Err(incompatible(format!(
                "removes virtual method {}",
                virtual_method.name_and_sig()
            )));
        }

        let new_methods: Vec<MethodRc> = pairs.iter().map(|(new, _)| new.clone()).collect();
        for method in &new_methods {
            method.set_holder(holder);
        }

        // Resolve every table entry before the holder changes
        let classes = self.registry.all_classes();
        let planned: Vec<Result<(ClassRc, TableAdjustments)>> = classes
            .par_iter()
            .map(|class| {
                revision::plan_adjustments(
                    class,
                    holder,
                    |method| old_methods.iter().any(|old| Arc::ptr_eq(old, method)),
                    |old| {
                        new_methods
                            .iter()
                            .find(|new| new.idnum == old.idnum && new.same_identity(old))
                            .cloned()
                    },
                )
                .map(|plan| (class.clone(), plan))
            })
            .collect();
        let mut plans = Vec::with_capacity(planned.len());
        for plan in planned {
            let (class, plan) = plan?;
            if !plan.is_empty() {
                plans.push((class, plan));
            }
        }

        holder.replace_methods(new_methods);

        for (new, previous) in &pairs {
            let Some(old) = previous else {
                continue;
            };
            if old.code == new.code {
                old.set_revision(RevisionState::Old);
                report.old += 1;
            } else {
                old.set_revision(RevisionState::Obsolete);
                report.obsolete += 1;
            }
        }
        for old in removed {
            old.set_revision(RevisionState::Deleted);
            report.deleted += 1;
        }

        let ctx = self.context();
        let results: Vec<Result<usize>> = plans
            .par_iter()
            .map(|(class, plan)| {
                let updated = plan.apply(&ctx, class)?;
                revision::check_no_old_entries(class)?;
                Ok(updated)
            })
            .collect();
        for result in results {
            report.entries_adjusted += result?;
        }

        self.statistics.record_adjusted(report.entries_adjusted);
        ctx.trace(
            self.config.trace_redefinition,
            DiagnosticCategory::Redefinition,
            "redefined",
            |d| {
                d.with_class(&holder.name)
                    .with_index(report.entries_adjusted)
            },
        );
        Ok(report)
    }
}

/// Whether a method added by redefinition would need a dispatch slot
fn would_be_virtual(method: &Method, holder: &Class) -> bool {
    !method.is_static()
        && !method.is_private()
        && !method.is_initializer()
        && !method.is_final_method(holder.flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::{
            constraints::LoaderConstraintTable,
            typesystem::{ClassBuilder, LoaderId, LookupFlags},
        },
        test::factories::{class, class_in, interface, linked_root, root_class, ROOT_VTABLE_LENGTH},
    };

    #[test]
    fn test_link_class_links_supertypes_first() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let runnable = interface(registry, "java/lang/Runnable", &[], &[("run", "()V")]);
        let base = class(registry, "app/Base", &object, &[], vec![]);
        let task = class(
            registry,
            "app/Task",
            &base,
            &[&runnable],
            vec![MethodSpec::new("run", "()V").public()],
        );

        linker.link_class(&task).unwrap();
        assert!(base.is_linked());
        assert!(runnable.is_linked());
        assert!(task.is_linked());
        assert!(matches!(
            linker.link_class(&task),
            Err(Error::AlreadyLinked(_))
        ));

        let stats = linker.statistics().snapshot();
        assert_eq!(stats.classes_linked, 4);
    }

    #[test]
    fn test_link_all_in_parallel() {
        let registry = Arc::new(ClassRegistry::new());
        let object = root_class(&registry);
        let shape = interface(&registry, "app/Shape", &[], &[("area", "()D")]);
        let mut previous = object.clone();
        for depth in 0..8 {
            for width in 0..4 {
                let name = format!("app/C{depth}_{width}");
                let created = class(
                    &registry,
                    &name,
                    &previous,
                    &[&shape],
                    vec![MethodSpec::new("area", "()D").public()],
                );
                if width == 0 {
                    previous = created;
                }
            }
        }

        let linker = Linker::new(registry.clone());
        let all = registry.all_classes();
        let linked = linker.link_all(&all).unwrap();
        assert_eq!(linked, all.len());
        assert!(all.iter().all(|class| class.is_linked()));
        assert_eq!(linker.link_all(&all).unwrap(), 0);

        for class in all.iter().filter(|c| c.name.starts_with("app/C")) {
            assert_eq!(class.vtable_length(), ROOT_VTABLE_LENGTH + 1);
            let area = class
                .find_local_method("area", "()D", LookupFlags::empty())
                .unwrap();
            assert_eq!(area.vtable_index(), Some(ROOT_VTABLE_LENGTH));
        }
    }

    #[test]
    fn test_hierarchy_depth_limit() {
        let registry = Arc::new(ClassRegistry::new());
        let object = root_class(&registry);
        let mut current = object;
        for i in 0..6 {
            current = class(&registry, &format!("app/D{i}"), &current, &[], vec![]);
        }

        let linker = Linker::new(registry).with_config(LinkerConfig {
            max_hierarchy_depth: 3,
            ..LinkerConfig::default()
        });
        assert!(matches!(
            linker.link_class(&current),
            Err(Error::HierarchyTooDeep(3))
        ));
        assert!(linker.diagnostics().has_errors());
    }

    #[test]
    fn test_loader_constraint_violation() {
        let registry = Arc::new(ClassRegistry::new());
        let object = root_class(&registry);
        let base = class_in(
            &registry,
            "lib/Base",
            LoaderId(1),
            &object,
            &[],
            vec![MethodSpec::new("accept", "(Lapp/Shared;)V").public()],
        );
        let derived = class_in(
            &registry,
            "app/Derived",
            LoaderId(2),
            &base,
            &[],
            vec![MethodSpec::new("accept", "(Lapp/Shared;)V").public()],
        );

        let constraints = Arc::new(LoaderConstraintTable::new());
        constraints.add_conflict("app/Shared", LoaderId(1), LoaderId(2));
        let linker = Linker::new(registry).with_constraints(constraints);

        match linker.link_class(&derived) {
            Err(Error::LoaderConstraint {
                type_name,
                loader,
                other_loader,
                ..
            }) => {
                assert_eq!(type_name, "app/Shared");
                assert_eq!(loader, LoaderId(2));
                assert_eq!(other_loader, LoaderId(1));
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(base.is_linked());
        assert!(!derived.is_linked());
    }

    #[test]
    fn test_redefinition_patches_subclass_tables() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let base = class(
            registry,
            "app/Base",
            &object,
            &[],
            vec![
                MethodSpec::new("work", "()V").public().code(&[1]),
                MethodSpec::new("helper", "()V").private().code(&[2]),
            ],
        );
        let derived = class(registry, "app/Derived", &base, &[], vec![]);
        linker.link_class(&derived).unwrap();

        let old_work = base.methods()[0].clone();
        let report = linker
            .redefine_class(
                &base,
                vec![
                    MethodSpec::new("work", "()V").public().code(&[9]),
                    MethodSpec::new("extra", "()V").public().static_(),
                ],
            )
            .unwrap();

        assert_eq!(report.obsolete, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.added, 1);
        assert_eq!(report.entries_adjusted, 2);
        assert_eq!(old_work.revision(), RevisionState::Obsolete);

        let new_work = base.methods()[0].clone();
        assert_eq!(new_work.idnum, old_work.idnum);
        assert_eq!(new_work.vtable_index(), Some(ROOT_VTABLE_LENGTH));
        for class in [&base, &derived] {
            let entry = class.vtable().unwrap().method_at(ROOT_VTABLE_LENGTH).unwrap();
            assert!(Arc::ptr_eq(&entry, &new_work));
        }
        assert_eq!(linker.statistics().snapshot().entries_adjusted, 2);
    }

    #[test]
    fn test_redefinition_rejects_shape_changes() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let base = class(
            registry,
            "app/Base",
            &object,
            &[],
            vec![MethodSpec::new("work", "()V").public()],
        );
        linker.link_class(&base).unwrap();

        let removes = linker.redefine_class(&base, vec![]);
        assert!(matches!(removes, Err(Error::IncompatibleRedefinition { .. })));

        let adds = linker.redefine_class(
            &base,
            vec![
                MethodSpec::new("work", "()V").public(),
                MethodSpec::new("more", "()V").public(),
            ],
        );
        assert!(matches!(adds, Err(Error::IncompatibleRedefinition { .. })));

        let changes = linker.redefine_class(&base, vec![MethodSpec::new("work", "()V").protected()]);
        assert!(matches!(changes, Err(Error::IncompatibleRedefinition { .. })));

        // Nothing was touched by the rejected attempts
        assert_eq!(base.methods()[0].revision(), RevisionState::Current);

        let unlinked = ClassBuilder::new("app/Unlinked")
            .extends(&object)
            .build(registry)
            .unwrap();
        assert!(matches!(
            linker.redefine_class(&unlinked, vec![]),
            Err(Error::NotLinked(_))
        ));
    }

    #[test]
    fn test_redefining_interface_updates_defaults() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let greeter = ClassBuilder::new("app/Greeter")
            .interface()
            .method(MethodSpec::new("greet", "()V").public().code(&[1]))
            .build(registry)
            .unwrap();
        let english = class(registry, "app/English", &object, &[&greeter], vec![]);
        linker.link_class(&english).unwrap();

        let report = linker
            .redefine_class(
                &greeter,
                vec![MethodSpec::new("greet", "()V").public().code(&[1])],
            )
            .unwrap();
        assert_eq!(report.old, 1);

        let current = greeter.methods()[0].clone();
        let slot = english.default_vtable_indices()[0];
        assert!(Arc::ptr_eq(
            &english.vtable().unwrap().method_at(slot).unwrap(),
            &current
        ));
        assert!(Arc::ptr_eq(&english.default_methods()[0], &current));
        let bound = english
            .itable()
            .unwrap()
            .select(&english, &greeter, 0)
            .unwrap();
        assert!(Arc::ptr_eq(&bound, &current));
    }
}
