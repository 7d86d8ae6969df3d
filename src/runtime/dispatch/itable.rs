//! Interface dispatch tables.
//!
//! An [`ITable`] has two regions:
//!
//! ```text
//! +------------------------------+  word 0
//! | interface I1 | offset -> m1  |  ItableOffsetEntry (2 words)
//! | interface I2 | offset -> m2  |
//! | <none>       | 0             |  terminator
//! +------------------------------+
//! | m1[0] | m1[1] | ...          |  method block of I1 (1 word per entry)
//! | m2[0] | ...                  |  method block of I2
//! +------------------------------+
//! ```
//!
//! Offsets are measured in words from the start of the table, so a live offset is never 0
//! and the terminator is recognisable. Each method block is indexed by the interface-local
//! index [`assign_itable_indices_for_interface`] gives the interface's methods when the
//! interface itself is linked. Interfaces own no itable.
//!
//! An entry is bound to the implementation an interface call on the class would select:
//! left [`ItableEntry::Empty`] when there is none or it is abstract, and marked
//! [`ItableEntry::IllegalAccess`] when it is not public. An illegal-access entry records only
//! the name of the implementation it rejected, so it stays valid when that body is redefined
//! or removed.

use std::{fmt, sync::RwLock};

use crate::{
    runtime::{
        diagnostics::DiagnosticCategory,
        dispatch::LinkContext,
        method::{DispatchIndex, Method, MethodRc},
        typesystem::{Class, ClassRc},
    },
    Error, Result,
};

/// Words taken by one method entry
pub const ITABLE_METHOD_ENTRY_WORDS: usize = 1;

/// One method entry of an interface table.
#[derive(Debug, Clone, Default)]
pub enum ItableEntry {
    /// No concrete public implementation; calling it raises `AbstractMethodError`
    #[default]
    Empty,
    /// The bound implementation
    Method(MethodRc),
    /// The implementation found is not public; calling it raises `IllegalAccessError`.
    /// Holds the display name of the rejected implementation.
    IllegalAccess(String),
}

impl ItableEntry {
    /// The bound implementation, `None` for empty and illegal-access entries
    #[must_use]
    pub fn method(&self) -> Option<&MethodRc> {
        match self {
            ItableEntry::Method(method) => Some(method),
            _ => None,
        }
    }

    /// `true` for empty entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, ItableEntry::Empty)
    }
}

/// One header entry of an interface table.
#[derive(Debug, Clone, Default)]
pub struct ItableOffsetEntry {
    /// The implemented interface; `None` for the terminator
    pub interface: Option<ClassRc>,
    /// Word offset of the interface's method block from the start of the table; 0 for the
    /// terminator
    pub offset: usize,
}

impl ItableOffsetEntry {
    /// Words taken by one header entry
    pub const SIZE_IN_WORDS: usize = 2;

    /// `true` for the entry closing the header
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.interface.is_none() && self.offset == 0
    }
}

/// Result of the itable sizing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItableSize {
    /// Interfaces given a header entry
    pub interfaces: usize,
    /// Method entries across all blocks
    pub methods: usize,
}

impl ItableSize {
    /// Total size in words, terminator included
    #[must_use]
    pub fn words(&self) -> usize {
        (self.interfaces + 1) * ItableOffsetEntry::SIZE_IN_WORDS
            + self.methods * ITABLE_METHOD_ENTRY_WORDS
    }
}

/// A class's interface dispatch table.
pub struct ITable {
    offsets: Box<[ItableOffsetEntry]>,
    methods: Box<[RwLock<ItableEntry>]>,
}

impl ITable {
    /// The table of an interface: no header, no methods
    pub(crate) fn empty() -> Self {
        ITable {
            offsets: Box::default(),
            methods: Box::default(),
        }
    }

    /// Size of the table in words, 0 for interfaces
    #[must_use]
    pub fn size_in_words(&self) -> usize {
        self.offsets.len() * ItableOffsetEntry::SIZE_IN_WORDS
            + self.methods.len() * ITABLE_METHOD_ENTRY_WORDS
    }

    /// Header entries, terminator included
    #[must_use]
    pub fn offset_entries(&self) -> &[ItableOffsetEntry] {
        &self.offsets
    }

    /// Interfaces with a method block, in table order
    pub fn interfaces(&self) -> impl Iterator<Item = &ClassRc> {
        self.offsets.iter().filter_map(|entry| entry.interface.as_ref())
    }

    /// Number of method entries
    #[must_use]
    pub fn method_entry_count(&self) -> usize {
        self.methods.len()
    }

    fn header_words(&self) -> usize {
        self.offsets.len() * ItableOffsetEntry::SIZE_IN_WORDS
    }

    /// Position and length of `interface`'s method block
    fn block(&self, interface: &Class) -> Option<(usize, usize)> {
        let position = self.offsets.iter().position(|entry| {
            entry
                .interface
                .as_ref()
                .is_some_and(|candidate| std::ptr::eq(candidate.as_ref(), interface))
        })?;
        let start = self.offsets[position].offset - self.header_words();
        let end = self
            .offsets
            .get(position + 1)
            .filter(|next| !next.is_terminator())
            .map_or(self.methods.len(), |next| next.offset - self.header_words());
        Some((start, end - start))
    }

    /// The entry `itable_index` of `interface`'s block
    #[must_use]
    pub fn entry(&self, interface: &Class, itable_index: usize) -> Option<ItableEntry> {
        let (start, length) = self.block(interface)?;
        if itable_index >= length {
            return None;
        }
        Some(read_lock!(self.methods[start + itable_index]).clone())
    }

    /// A snapshot of `interface`'s method block
    #[must_use]
    pub fn entries_for(&self, interface: &Class) -> Vec<ItableEntry> {
        self.block(interface)
            .map(|(start, length)| {
                self.methods[start..start + length]
                    .iter()
                    .map(|entry| read_lock!(entry).clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Select the implementation an interface call runs.
    ///
    /// ## Arguments
    /// * `receiver`     - Class owning this table
    /// * `interface`    - The interface named by the call
    /// * `itable_index` - Interface-local index of the called method
    ///
    /// # Errors
    /// Returns [`Error::AbstractMethod`] for an empty entry, [`Error::IllegalAccess`] for a
    /// non-public implementation and [`Error::Linkage`] if `receiver` does not implement
    /// `interface` or the index is outside its block.
    pub fn select(&self, receiver: &Class, interface: &Class, itable_index: usize) -> Result<MethodRc> {
        let Some(entry) = self.entry(interface, itable_index) else {
            return Err(Error::Linkage {
                class: receiver.name.clone(),
                message: format!(
                    "no itable entry {} for interface {}",
                    itable_index, interface.name
                ),
            });
        };

        match entry {
            ItableEntry::Method(method) => Ok(method),
            ItableEntry::IllegalAccess(method) => Err(Error::IllegalAccess {
                class: receiver.name.clone(),
                method,
            }),
            ItableEntry::Empty => Err(Error::AbstractMethod {
                class: receiver.name.clone(),
                method: method_for_itable_index(interface, itable_index)
                    .map_or_else(|| format!("<itable entry {itable_index}>"), |m| m.name_and_sig()),
            }),
        }
    }

    pub(crate) fn put(&self, index: usize, entry: ItableEntry) -> Result<()> {
        let Some(slot) = self.methods.get(index) else {
            return Err(inconsistency!(
                "itable method entry {} out of bounds for {}",
                index,
                self.methods.len()
            ));
        };
        *write_lock!(slot) = entry;
        Ok(())
    }

    /// Every method entry with its position, across all blocks
    #[must_use]
    pub fn method_entries(&self) -> Vec<(usize, ItableEntry)> {
        self.methods
            .iter()
            .enumerate()
            .map(|(index, entry)| (index, read_lock!(entry).clone()))
            .collect()
    }

    /// The first entry referencing a method a redefinition has replaced
    #[must_use]
    pub fn find_old_entry(&self) -> Option<(usize, MethodRc)> {
        self.methods.iter().enumerate().find_map(|(index, entry)| {
            read_lock!(entry)
                .method()
                .filter(|method| method.is_old())
                .map(|method| (index, method.clone()))
        })
    }

    /// Check that the header is closed by exactly one terminator.
    ///
    /// # Errors
    /// Returns [`Error::Linkage`] for a missing or misplaced terminator.
    pub fn verify_terminator(&self, class: &Class) -> Result<()> {
        let Some((last, header)) = self.offsets.split_last() else {
            return Ok(());
        };
        if !last.is_terminator() || header.iter().any(ItableOffsetEntry::is_terminator) {
            return Err(Error::Linkage {
                class: class.name.clone(),
                message: String::from("itable header is not terminated by a single null entry"),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for ITable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ITable")
            .field("interfaces", &self.interfaces().count())
            .field("methods", &self.methods.len())
            .finish()
    }
}

impl fmt::Display for ITable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "itable ({} words):", self.size_in_words())?;
        for interface in self.interfaces() {
            writeln!(f, "  {}:", interface.name)?;
            for (index, entry) in self.entries_for(interface).iter().enumerate() {
                match entry {
                    ItableEntry::Empty => writeln!(f, "    {:>4}: <empty>", index)?,
                    ItableEntry::Method(method) => {
                        writeln!(f, "    {:>4}: {}", index, method.display_name())?;
                    }
                    ItableEntry::IllegalAccess(method) => {
                        writeln!(f, "    {:>4}: {} [illegal access]", index, method)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn interface_method_needs_itable_index(method: &Method) -> bool {
    !method.is_static() && !method.is_private() && !method.is_initializer()
}

/// Size of `interface`'s method block in any implementing class: one past the highest
/// interface-local index. Methods that kept a vtable slot take no entry. The interface must
/// be linked.
#[must_use]
pub fn method_count_for_interface(interface: &Class) -> usize {
    interface
        .methods()
        .iter()
        .filter_map(|method| method.itable_index())
        .max()
        .map_or(0, |last| last + 1)
}

/// The method of `interface` assigned `itable_index`
#[must_use]
pub fn method_for_itable_index(interface: &Class, itable_index: usize) -> Option<MethodRc> {
    interface
        .methods()
        .into_iter()
        .find(|method| method.dispatch_index() == DispatchIndex::Interface(itable_index))
}

/// Give every interface method without a vtable slot its interface-local index.
///
/// Runs when the interface itself is linked, after its vtable was built. Returns the number
/// of indices assigned.
pub fn assign_itable_indices_for_interface(ctx: &LinkContext<'_>, interface: &Class) -> usize {
    let mut next = 0;
    for method in interface.methods() {
        if !interface_method_needs_itable_index(&method) || method.has_vtable_index() {
            continue;
        }
        method.set_dispatch_index(DispatchIndex::Interface(next));
        ctx.trace(ctx.config.trace_itables, DiagnosticCategory::ITable, "itable index", |d| {
            d.with_class(&interface.name)
                .with_method(method.name_and_sig())
                .with_index(next)
        });
        next += 1;
    }
    next
}

/// Interfaces of a class that receive a header entry, in table order
fn visited_interfaces(transitive_interfaces: &[ClassRc]) -> impl Iterator<Item = (&ClassRc, usize)> {
    transitive_interfaces.iter().filter_map(|interface| {
        let count = method_count_for_interface(interface);
        (count > 0 || !interface.transitive_interfaces.is_empty()).then_some((interface, count))
    })
}

/// Compute the itable size of a class implementing `transitive_interfaces`.
#[must_use]
pub fn compute_itable_size(transitive_interfaces: &[ClassRc]) -> ItableSize {
    visited_interfaces(transitive_interfaces).fold(ItableSize::default(), |size, (_, count)| {
        ItableSize {
            interfaces: size.interfaces + 1,
            methods: size.methods + count,
        }
    })
}

/// Build the itable of `class`.
///
/// For an interface, assigns the interface-local indices and returns an empty table. For a
/// class, lays out the header and binds every method entry. All transitive interfaces must
/// be linked.
///
/// # Errors
/// Returns [`Error::NotLinked`] for an unlinked interface, [`Error::LoaderConstraint`] when a
/// binding crosses incompatible loaders and [`Error::Linkage`] for a malformed header.
pub fn build_itable(ctx: &LinkContext<'_>, class: &Class) -> Result<ITable> {
    if class.is_interface() {
        assign_itable_indices_for_interface(ctx, class);
        return Ok(ITable::empty());
    }

    if let Some(unlinked) = class.transitive_interfaces.iter().find(|i| !i.is_linked()) {
        return Err(Error::NotLinked(unlinked.name.clone()));
    }

    let size = compute_itable_size(&class.transitive_interfaces);
    let header_words = (size.interfaces + 1) * ItableOffsetEntry::SIZE_IN_WORDS;

    let mut offsets = Vec::with_capacity(size.interfaces + 1);
    let mut next_method = 0;
    for (interface, count) in visited_interfaces(&class.transitive_interfaces) {
        offsets.push(ItableOffsetEntry {
            interface: Some(interface.clone()),
            offset: header_words + next_method * ITABLE_METHOD_ENTRY_WORDS,
        });
        next_method += count;
    }
    offsets.push(ItableOffsetEntry::default());

    let table = ITable {
        offsets: offsets.into_boxed_slice(),
        methods: (0..size.methods)
            .map(|_| RwLock::new(ItableEntry::Empty))
            .collect(),
    };

    for entry in table.offset_entries() {
        let Some(interface) = entry.interface.as_ref() else {
            continue;
        };
        initialize_itable_for_interface(
            ctx,
            class,
            &table,
            interface,
            entry.offset - header_words,
        )?;
    }

    table.verify_terminator(class)?;
    Ok(table)
}

fn initialize_itable_for_interface(
    ctx: &LinkContext<'_>,
    class: &Class,
    table: &ITable,
    interface: &ClassRc,
    block_start: usize,
) -> Result<()> {
    let block_length = method_count_for_interface(interface);

    for method in interface.methods() {
        let Some(itable_index) = method.itable_index() else {
            continue;
        };
        if itable_index >= block_length {
            return Err(inconsistency!(
                "itable index {} of {} exceeds its block of {}",
                itable_index,
                method.display_name(),
                block_length
            ));
        }

        let target = ctx
            .resolver
            .lookup_instance_method_in_classes(class, &method.name, &method.signature);
        let entry = match target {
            None => ItableEntry::Empty,
            Some(target) if !target.is_public() => {
                ItableEntry::IllegalAccess(target.display_name())
            }
            Some(target) if target.is_abstract() => ItableEntry::Empty,
            Some(target) => {
                if ctx.config.check_loader_constraints {
                    check_itable_loaders(ctx, class, interface, &target)?;
                }
                ItableEntry::Method(target)
            }
        };

        ctx.trace(ctx.config.trace_itables, DiagnosticCategory::ITable, "itable entry", |d| {
            let d = d
                .with_class(&class.name)
                .with_method(method.display_name())
                .with_index(itable_index);
            match &entry {
                ItableEntry::Method(bound) => d.with_flags(bound.display_name()),
                ItableEntry::IllegalAccess(rejected) => {
                    d.with_flags(format!("{rejected} [illegal access]"))
                }
                ItableEntry::Empty => d,
            }
        });
        table.put(block_start + itable_index, entry)?;
    }

    Ok(())
}

fn check_itable_loaders(
    ctx: &LinkContext<'_>,
    class: &Class,
    interface: &Class,
    target: &Method,
) -> Result<()> {
    let Some(target_loader) = target.holder().map(|holder| holder.loader) else {
        return Ok(());
    };
    if target_loader == interface.loader {
        return Ok(());
    }

    match ctx
        .constraints
        .check_signature_loaders(&target.signature, target_loader, interface.loader)
    {
        Some(type_name) => {
            ctx.diagnostics.error(
                DiagnosticCategory::LoaderConstraint,
                format!(
                    "{} implementing {}.{} in {}",
                    target.display_name(),
                    interface.name,
                    target.name_and_sig(),
                    class.name
                ),
            );
            Err(Error::LoaderConstraint {
                class: class.name.clone(),
                method: target.name_and_sig(),
                type_name,
                loader: target_loader,
                other_loader: interface.loader,
            })
        }
        None => Ok(()),
    }
}
