// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Abstract Syntax Tree definitions for FHIRPath expressions.
//!
//! Two representations live here:
//!
//! - [`ExpressionNode`], the typed AST the parser builds directly and the
//!   compiler binds.
//! - [`ParseNode`], the generic tagged tree described by the external
//!   parser/compiler wire contract (grammar-alternative tag, verbatim span,
//!   terminal token texts, ordered children) -- produced on demand from an
//!   [`ExpressionNode`] via [`ExpressionNode::to_parse_node`] for callers
//!   that need the interoperable tree shape rather than the typed one.

mod expression;
mod operator;
mod parse_node;
mod visitor;

pub use expression::*;
pub use operator::*;
pub use parse_node::*;
pub use visitor::*;
