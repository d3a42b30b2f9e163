//! Symbol table: names referenced by a listing, with import/export status.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use log::trace;

/// Linkage of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SymbolKind {
    /// Referenced or defined locally.
    #[default]
    Normal,
    /// Declared with `extern`.
    Imported,
    /// Declared with `global`.
    Exported,
}

/// A named symbol and the order it was first seen in.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Symbol {
    /// Symbol name.
    pub name: String,
    /// Zero-based ordinal, assigned on first reference.
    pub index: usize,
    /// Linkage.
    pub kind: SymbolKind,
}

/// Per-pass registry of symbols keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolTable {
    symbols: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `name`, creating it with the next ordinal if it is new.
    pub fn resolve(&mut self, name: &str) -> &Symbol {
        let next = self.symbols.len();
        self.symbols
            .entry(String::from(name))
            .or_insert_with(|| Symbol {
                name: String::from(name),
                index: next,
                kind: SymbolKind::Normal,
            })
    }

    /// Mark `name` as imported. Repeating the call is a no-op.
    pub fn import(&mut self, name: &str) -> &Symbol {
        self.promote(name, SymbolKind::Imported)
    }

    /// Mark `name` as exported. Repeating the call is a no-op.
    pub fn export(&mut self, name: &str) -> &Symbol {
        self.promote(name, SymbolKind::Exported)
    }

    /// Replace the stored entry for `symbol.name`, keeping its ordinal if it
    /// already exists.
    pub fn update(&mut self, mut symbol: Symbol) {
        if let Some(existing) = self.symbols.get(&symbol.name) {
            symbol.index = existing.index;
        } else {
            symbol.index = self.symbols.len();
        }
        self.symbols.insert(symbol.name.clone(), symbol);
    }

    /// Look up `name` without creating it.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        let mut all: Vec<&Symbol> = self.symbols.values().collect();
        all.sort_by_key(|s| s.index);
        all.into_iter()
    }

    fn promote(&mut self, name: &str, kind: SymbolKind) -> &Symbol {
        let next = self.symbols.len();
        let symbol = self
            .symbols
            .entry(String::from(name))
            .or_insert_with(|| Symbol {
                name: String::from(name),
                index: next,
                kind: SymbolKind::Normal,
            });
        if symbol.kind != kind {
            trace!("symbol {} #{}: {:?} -> {:?}", name, symbol.index, symbol.kind, kind);
            symbol.kind = kind;
        }
        symbol
    }
}
