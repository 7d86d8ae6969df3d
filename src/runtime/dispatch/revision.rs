//! Table maintenance after class redefinition.
//!
//! Redefinition replaces a holder's method list. Tables of every linked class may still
//! reference the previous bodies. Updating them runs in two steps: [`plan_adjustments`]
//! resolves every affected entry to its replacement without writing anything, and
//! [`TableAdjustments::apply`] writes a plan that resolved completely.
//! [`adjust_method_entries`] runs both for a holder whose methods were already swapped, and
//! [`replace_method`] performs a single explicit replacement. Each finishes by checking that
//! no entry references a replaced body.

use std::sync::Arc;

use crate::{
    runtime::{
        diagnostics::DiagnosticCategory,
        dispatch::{ItableEntry, LinkContext},
        method::MethodRc,
        typesystem::Class,
    },
    Error, Result,
};

/// Entry rewrites for one class, resolved before any of them is written.
#[derive(Debug, Default)]
pub struct TableAdjustments {
    /// `(vtable index, old body, new body)`
    vtable: Vec<(usize, MethodRc, MethodRc)>,
    /// `(itable method entry, new body)`
    itable: Vec<(usize, MethodRc)>,
}

impl TableAdjustments {
    /// Number of entries the plan rewrites
    #[must_use]
    pub fn len(&self) -> usize {
        self.vtable.len() + self.itable.len()
    }

    /// `true` if no entry needs rewriting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vtable.is_empty() && self.itable.is_empty()
    }

    /// Write the planned entries into `class`'s tables.
    ///
    /// Returns the number of entries rewritten.
    ///
    /// # Errors
    /// Returns [`Error::Inconsistent`] if a planned index no longer fits the tables, which
    /// only happens when the plan was made for another class.
    pub fn apply(&self, ctx: &LinkContext<'_>, class: &Class) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }
        let (Some(vtable), Some(itable)) = (class.vtable(), class.itable()) else {
            return Err(inconsistency!("adjustments planned for unlinked class {}", class.name));
        };

        for (index, old, new) in &self.vtable {
            vtable.put_method_at(*index, new.clone())?;
            if old.is_default_method() {
                class.replace_default_method(*index, old, new);
            }
            trace_adjustment(ctx, class, new, "vtable", *index);
        }
        for (index, new) in &self.itable {
            itable.put(*index, ItableEntry::Method(new.clone()))?;
            trace_adjustment(ctx, class, new, "itable", *index);
        }
        Ok(self.len())
    }
}

/// Resolve every entry of `class`'s tables that references a replaced method of `holder`.
///
/// Nothing is written; unlinked classes get an empty plan.
///
/// ## Arguments
/// * `class`       - A class whose tables are inspected
/// * `holder`      - The redefined class
/// * `is_replaced` - Whether a method of `holder` is being replaced
/// * `counterpart` - The body replacing a method, `None` if it has none
///
/// # Errors
/// Returns [`Error::RetiredMethod`] for the first entry whose method has no counterpart.
pub fn plan_adjustments<R, C>(
    class: &Class,
    holder: &Class,
    is_replaced: R,
    counterpart: C,
) -> Result<TableAdjustments>
where
    R: Fn(&MethodRc) -> bool,
    C: Fn(&MethodRc) -> Option<MethodRc>,
{
    let mut plan = TableAdjustments::default();
    let (Some(vtable), Some(itable)) = (class.vtable(), class.itable()) else {
        return Ok(plan);
    };

    let retired = |old: &MethodRc, table: &'static str, index: usize| Error::RetiredMethod {
        class: class.name.clone(),
        method: old.display_name(),
        table,
        index,
    };

    for (index, entry) in vtable.entries().into_iter().enumerate() {
        let Some(old) = entry.filter(|method| method.is_held_by(holder) && is_replaced(method))
        else {
            continue;
        };
        let new = counterpart(&old).ok_or_else(|| retired(&old, "vtable", index))?;
        plan.vtable.push((index, old, new));
    }

    for (index, entry) in itable.method_entries() {
        let ItableEntry::Method(old) = entry else {
            continue;
        };
        if !old.is_held_by(holder) || !is_replaced(&old) {
            continue;
        }
        let new = counterpart(&old).ok_or_else(|| retired(&old, "itable", index))?;
        plan.itable.push((index, new));
    }

    Ok(plan)
}

/// Replace every entry of `class`'s tables that references an old method of `holder`.
///
/// `holder` must already declare its new methods and its previous bodies must be marked
/// old. The tables are left untouched unless every entry resolves to a current method.
///
/// ## Arguments
/// * `ctx`    - Builder context
/// * `class`  - A linked class whose tables are patched
/// * `holder` - The redefined class
///
/// Returns the number of entries rewritten. Unlinked classes are left alone.
///
/// # Errors
/// Returns [`Error::RetiredMethod`] if an old method has no current counterpart or if any
/// entry still references an old method afterwards.
pub fn adjust_method_entries(ctx: &LinkContext<'_>, class: &Class, holder: &Class) -> Result<usize> {
    let plan = plan_adjustments(
        class,
        holder,
        |method| method.is_old(),
        |old| {
            holder
                .method_with_idnum(old.idnum)
                .filter(|method| !method.is_old() && method.same_identity(old))
        },
    )?;
    let updated = plan.apply(ctx, class)?;
    check_no_old_entries(class)?;
    Ok(updated)
}

/// Replace `old` with `new` in every table entry of `class` and in its default-method list.
///
/// Both methods must share their holder, name and signature. `new` inherits `old`'s dispatch
/// index if it has none yet.
///
/// # Errors
/// Returns [`Error::IncompatibleRedefinition`] if the methods do not share identity, and
/// [`Error::RetiredMethod`] if a replaced body is still referenced afterwards.
pub fn replace_method(
    ctx: &LinkContext<'_>,
    class: &Class,
    old: &MethodRc,
    new: &MethodRc,
) -> Result<usize> {
    let same_holder = match (old.holder(), new.holder()) {
        (Some(a), Some(b)) => Arc::ptr_eq(&a, &b),
        _ => false,
    };
    if !same_holder || !old.same_identity(new) {
        return Err(Error::IncompatibleRedefinition {
            class: class.name.clone(),
            message: format!(
                "{} cannot replace {}",
                new.display_name(),
                old.display_name()
            ),
        });
    }

    if new.dispatch_index().is_unassigned() {
        new.set_dispatch_index(old.dispatch_index());
    }

    let mut updated = 0;
    if let Some(vtable) = class.vtable() {
        for (index, entry) in vtable.entries().into_iter().enumerate() {
            if entry.is_some_and(|method| Arc::ptr_eq(&method, old)) {
                vtable.put_method_at(index, new.clone())?;
                class.replace_default_method(index, old, new);
                trace_adjustment(ctx, class, new, "vtable", index);
                updated += 1;
            }
        }
    }

    if let Some(itable) = class.itable() {
        for (index, entry) in itable.method_entries() {
            if !entry.method().is_some_and(|method| Arc::ptr_eq(method, old)) {
                continue;
            }
            itable.put(index, ItableEntry::Method(new.clone()))?;
            trace_adjustment(ctx, class, new, "itable", index);
            updated += 1;
        }
    }

    check_no_old_entries(class)?;
    Ok(updated)
}

/// Fail if any table entry of `class` references an old method.
///
/// # Errors
/// Returns [`Error::RetiredMethod`] naming the first offending entry.
pub fn check_no_old_entries(class: &Class) -> Result<()> {
    let offending = class
        .vtable()
        .and_then(|vtable| vtable.find_old_entry().map(|found| ("vtable", found)))
        .or_else(|| {
            class
                .itable()
                .and_then(|itable| itable.find_old_entry().map(|found| ("itable", found)))
        });

    match offending {
        Some((table, (index, method))) => Err(Error::RetiredMethod {
            class: class.name.clone(),
            method: method.display_name(),
            table,
            index,
        }),
        None => Ok(()),
    }
}

fn trace_adjustment(ctx: &LinkContext<'_>, class: &Class, new: &MethodRc, table: &str, index: usize) {
    ctx.trace(
        ctx.config.trace_redefinition,
        DiagnosticCategory::Redefinition,
        "adjust entry",
        |d| {
            d.with_class(&class.name)
                .with_method(new.display_name())
                .with_index(index)
                .with_flags(table)
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::{
            method::{Method, RevisionState},
            typesystem::MethodSpec,
        },
        test::factories::{class, linked_root, ROOT_VTABLE_LENGTH},
    };

    #[test]
    fn test_replace_method_swaps_entries() {
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

        let old = base.methods()[0].clone();
        let new = Arc::new(Method::new(
            registry.next_method_token(),
            old.idnum,
            "work",
            "()V",
            0x0001,
            &[7],
        ));
        new.set_holder(&base);

        let ctx = linker.context();
        assert_eq!(replace_method(&ctx, &base, &old, &new).unwrap(), 1);
        assert_eq!(new.vtable_index(), Some(ROOT_VTABLE_LENGTH));
        let entry = base.vtable().unwrap().method_at(ROOT_VTABLE_LENGTH).unwrap();
        assert!(Arc::ptr_eq(&entry, &new));
    }

    #[test]
    fn test_replace_method_requires_identity() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let base = class(
            registry,
            "app/Base",
            &object,
            &[],
            vec![
                MethodSpec::new("work", "()V").public(),
                MethodSpec::new("rest", "()V").public(),
            ],
        );
        linker.link_class(&base).unwrap();

        let methods = base.methods();
        let ctx = linker.context();
        assert!(matches!(
            replace_method(&ctx, &base, &methods[0], &methods[1]),
            Err(Error::IncompatibleRedefinition { .. })
        ));

        let foreign = object.methods()[1].clone();
        assert!(matches!(
            replace_method(&ctx, &base, &foreign, &methods[0]),
            Err(Error::IncompatibleRedefinition { .. })
        ));
    }

    #[test]
    fn test_unresolved_entry_leaves_tables_untouched() {
        let (linker, object) = linked_root();
        let registry = linker.registry();
        let base = class(
            registry,
            "app/Base",
            &object,
            &[],
            vec![
                MethodSpec::new("work", "()V").public(),
                MethodSpec::new("rest", "()V").public(),
            ],
        );
        linker.link_class(&base).unwrap();

        let old = base.methods();
        let work = Arc::new(Method::new(
            registry.next_method_token(),
            old[0].idnum,
            "work",
            "()V",
            0x0001,
            &[9],
        ));
        work.set_holder(&base);
        base.replace_methods(vec![work.clone()]);
        for method in &old {
            method.set_revision(RevisionState::Obsolete);
        }

        // rest has no counterpart, so work's slot must not be rewritten either
        let ctx = linker.context();
        match adjust_method_entries(&ctx, &base, &base) {
            Err(Error::RetiredMethod { table, index, .. }) => {
                assert_eq!(table, "vtable");
                assert_eq!(index, ROOT_VTABLE_LENGTH + 1);
            }
            other => panic!("unexpected result {other:?}"),
        }
        let vtable = base.vtable().unwrap();
        assert!(Arc::ptr_eq(&vtable.method_at(ROOT_VTABLE_LENGTH).unwrap(), &old[0]));
        assert!(Arc::ptr_eq(&vtable.method_at(ROOT_VTABLE_LENGTH + 1).unwrap(), &old[1]));
    }

    #[test]
    fn test_plan_then_apply() {
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

        let old = base.methods()[0].clone();
        let new = Arc::new(Method::new(
            registry.next_method_token(),
            old.idnum,
            "work",
            "()V",
            0x0001,
            &[4],
        ));
        new.set_holder(&base);

        let plan = plan_adjustments(
            &base,
            &base,
            |method| Arc::ptr_eq(method, &old),
            |_| Some(new.clone()),
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        // Planning writes nothing
        let slot = base.vtable().unwrap().method_at(ROOT_VTABLE_LENGTH).unwrap();
        assert!(Arc::ptr_eq(&slot, &old));

        let ctx = linker.context();
        assert_eq!(plan.apply(&ctx, &base).unwrap(), 1);
        let slot = base.vtable().unwrap().method_at(ROOT_VTABLE_LENGTH).unwrap();
        assert!(Arc::ptr_eq(&slot, &new));
    }

    #[test]
    fn test_stale_entries_are_reported() {
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
        assert!(check_no_old_entries(&base).is_ok());

        base.methods()[0].set_revision(RevisionState::Obsolete);
        match check_no_old_entries(&base) {
            Err(Error::RetiredMethod { table, index, .. }) => {
                assert_eq!(table, "vtable");
                assert_eq!(index, ROOT_VTABLE_LENGTH);
            }
            other => panic!("unexpected result {other:?}"),
        }

        // The holder still declares the obsolete body: no current counterpart exists
        let ctx = linker.context();
        assert!(matches!(
            adjust_method_entries(&ctx, &base, &base),
            Err(Error::RetiredMethod { .. })
        ));
    }
}
