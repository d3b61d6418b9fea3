//! Compiles parsed expressions into bound trees and caches the result
//! process-wide, keyed by source text.

pub mod bound;
pub mod cache;

use crate::ast::expression::ExpressionNode;
use crate::error::FhirPathResult;
use crate::registry::FunctionRegistry;
use cache::{CompiledExpression, CompiledExpressionCache};
use std::sync::Arc;

/// Compile `ast` (already parsed from `source`) against `registry`, reusing
/// a cached bound tree for `source` when present in `cache`.
pub fn compile_cached(
    source: &str,
    ast: &ExpressionNode,
    registry: &FunctionRegistry,
    cache: &CompiledExpressionCache,
) -> FhirPathResult<Arc<CompiledExpression>> {
    if let Some(hit) = cache.get(source) {
        return Ok(hit);
    }
    let root = bound::compile(ast, registry)?;
    let async_flag = bound::uses_async(&root);
    Ok(cache.insert(source.to_string(), root, async_flag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    #[test]
    fn compiling_twice_reuses_the_cache() {
        let registry = FunctionRegistry::new();
        let cache = CompiledExpressionCache::new();
        let ast = parser::parse("name.given").unwrap();

        let first = compile_cached("name.given", &ast, &registry, &cache).unwrap();
        let second = compile_cached("name.given", &ast, &registry, &cache).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats().hits.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
