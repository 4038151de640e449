//! Compile-time name resolution.
//!
//! A tree of scopes owned by the compiler. Resolving a name through an outer
//! scope converts it into a free symbol of the current scope, which is how
//! closures discover and number their captures.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    pub outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    pub num_definitions: usize,
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Defines `name` in this scope: Global in the root scope, Local
    /// elsewhere. Redefinition overwrites and consumes a fresh index.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Binds the name a function is being assigned to inside its own scope,
    /// so the body can refer to itself before the outer slot is written.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }
        let symbol = self.outer.as_mut()?.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            _ => Some(self.define_free(symbol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, scope: SymbolScope, index: usize) -> Symbol {
        Symbol {
            name: name.to_string(),
            scope,
            index,
        }
    }

    #[test]
    fn defines_globals_then_locals_per_scope() {
        let mut global = SymbolTable::new();
        assert_eq!(global.define("a"), symbol("a", SymbolScope::Global, 0));
        assert_eq!(global.define("b"), symbol("b", SymbolScope::Global, 1));

        let mut first_local = SymbolTable::new_enclosed(global);
        assert_eq!(first_local.define("c"), symbol("c", SymbolScope::Local, 0));
        assert_eq!(first_local.define("d"), symbol("d", SymbolScope::Local, 1));

        let mut second_local = SymbolTable::new_enclosed(first_local);
        assert_eq!(second_local.define("e"), symbol("e", SymbolScope::Local, 0));
        assert_eq!(second_local.define("f"), symbol("f", SymbolScope::Local, 1));
    }

    #[test]
    fn resolves_globals() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("b");

        for expected in [
            symbol("a", SymbolScope::Global, 0),
            symbol("b", SymbolScope::Global, 1),
        ] {
            assert_eq!(global.resolve(&expected.name), Some(expected));
        }
    }

    #[test]
    fn redefinition_overwrites_with_a_fresh_index() {
        let mut global = SymbolTable::new();
        global.define("a");
        assert_eq!(global.define("a"), symbol("a", SymbolScope::Global, 1));
        assert_eq!(global.num_definitions, 2);
    }

    #[test]
    fn resolves_locals_through_to_globals() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("b");

        let mut local = SymbolTable::new_enclosed(global);
        local.define("c");
        local.define("d");

        for expected in [
            symbol("a", SymbolScope::Global, 0),
            symbol("b", SymbolScope::Global, 1),
            symbol("c", SymbolScope::Local, 0),
            symbol("d", SymbolScope::Local, 1),
        ] {
            assert_eq!(local.resolve(&expected.name), Some(expected));
        }
    }

    #[test]
    fn resolves_builtins_from_any_depth() {
        let mut global = SymbolTable::new();
        let expected = [
            symbol("a", SymbolScope::Builtin, 0),
            symbol("c", SymbolScope::Builtin, 1),
            symbol("e", SymbolScope::Builtin, 2),
            symbol("f", SymbolScope::Builtin, 3),
        ];
        for (index, sym) in expected.iter().enumerate() {
            global.define_builtin(index, &sym.name);
        }

        let mut second_local = SymbolTable::new_enclosed(SymbolTable::new_enclosed(global));
        for sym in &expected {
            assert_eq!(second_local.resolve(&sym.name), Some(sym.clone()));
        }
    }

    #[test]
    fn resolving_outer_locals_creates_free_symbols() {
        let mut global = SymbolTable::new();
        global.define("a");
        global.define("b");

        let mut first_local = SymbolTable::new_enclosed(global);
        first_local.define("c");
        first_local.define("d");

        let mut second_local = SymbolTable::new_enclosed(first_local);
        second_local.define("e");
        second_local.define("f");

        for expected in [
            symbol("a", SymbolScope::Global, 0),
            symbol("b", SymbolScope::Global, 1),
            symbol("c", SymbolScope::Free, 0),
            symbol("d", SymbolScope::Free, 1),
            symbol("e", SymbolScope::Local, 0),
            symbol("f", SymbolScope::Local, 1),
        ] {
            assert_eq!(second_local.resolve(&expected.name), Some(expected));
        }
        assert_eq!(
            second_local.free_symbols,
            vec![
                symbol("c", SymbolScope::Local, 0),
                symbol("d", SymbolScope::Local, 1),
            ]
        );
    }

    #[test]
    fn unresolvable_names_stay_unresolved() {
        let mut global = SymbolTable::new();
        global.define("a");

        let mut first_local = SymbolTable::new_enclosed(global);
        first_local.define("c");

        let mut second_local = SymbolTable::new_enclosed(first_local);
        second_local.define("e");
        second_local.define("f");

        for expected in [
            symbol("a", SymbolScope::Global, 0),
            symbol("c", SymbolScope::Free, 0),
            symbol("e", SymbolScope::Local, 0),
            symbol("f", SymbolScope::Local, 1),
        ] {
            assert_eq!(second_local.resolve(&expected.name), Some(expected));
        }

        assert_eq!(second_local.resolve("b"), None);
        assert_eq!(second_local.resolve("d"), None);
    }

    #[test]
    fn defines_and_resolves_function_names() {
        let mut global = SymbolTable::new();
        global.define_function_name("a");
        assert_eq!(
            global.resolve("a"),
            Some(symbol("a", SymbolScope::Function, 0))
        );
    }

    #[test]
    fn later_definitions_shadow_the_function_name() {
        let mut global = SymbolTable::new();
        global.define_function_name("a");
        global.define("a");
        assert_eq!(
            global.resolve("a"),
            Some(symbol("a", SymbolScope::Global, 0))
        );
    }
}
