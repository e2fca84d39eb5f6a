// ABOUTME: Parser module for JSON template definitions
// ABOUTME: Exports the template data model and the directory-backed template store

pub mod error;
pub mod store;
pub mod template;

pub use error::{ParserError, Result};
pub use store::{LoadReport, TemplateStore};
pub use template::{
    Execution, ExecutionType, InputDef, InputScope, OutputDef, RequestMethod, ResponseEncoding,
    ResponseFormat, Step, Template, TemplateMeta,
};
