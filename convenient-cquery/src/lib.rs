//! Configured query (cquery) proto output
//!
//! Turns configured targets streamed by a query engine into protobuf
//! results, the way Bazel's `cquery --output=proto|textproto|jsonproto` does.
//!
//! # Pipeline
//!
//! 1. [`TargetRecordBuilder`] resolves each rule's attributes under the
//!    target's configuration (`select()` branches are evaluated against the
//!    config conditions) and emits them sorted by name.
//! 2. [`ResultAggregator`] collects record batches from concurrent producers.
//! 3. [`OutputEncoder`] narrows the result to plain targets when
//!    configurations are not requested, then renders binary, text or JSON.
//!
//! [`CqueryOutputCallback`] wires the three together behind the streaming
//! `start` / `process_output` / `close` interface.
//!
//! # Example
//!
//! ```
//! use convenient_cquery::{
//!     AttributeDef, AttributeType, AttributeValue, ConfigConditions, ConfigurationToken,
//!     CqueryOutputCallback, OutputFormat, OutputOptions, QueriedTarget, RuleDefinition, Selector,
//! };
//!
//! let rule = RuleDefinition::new("//app:bin", "cc_binary").with_attribute(AttributeDef::select(
//!     "copts",
//!     AttributeType::StringList,
//!     Selector::from_branches(vec![(
//!         "//cfg:opt",
//!         AttributeValue::StringList(vec!["-O2".to_string()]),
//!     )]),
//! ));
//! let target = QueriedTarget::rule(
//!     rule,
//!     ConfigurationToken::new("abc"),
//!     ConfigConditions::new().with("//cfg:opt", true),
//! );
//!
//! let callback = CqueryOutputCallback::new(OutputOptions::with_format(OutputFormat::Json), Vec::new());
//! callback.start()?;
//! callback.process_output(&[target])?;
//! let json = String::from_utf8(callback.close(false)?).unwrap();
//! assert!(json.contains(r#""stringListValue":["-O2"]"#));
//! # Ok::<(), convenient_cquery::OutputError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod aggregator;
pub mod attribute;
pub mod callback;
pub mod condition;
pub mod encoder;
pub mod error;
pub mod options;
pub mod proto;
pub mod record;
pub mod resolver;
pub mod textproto;

pub use aggregator::{ResultAggregator, ResultSet};
pub use attribute::{
    AttributeDef, AttributeType, AttributeValue, DEFAULT_CONDITION, DeclaredValue, RuleDefinition,
    SelectBranch, Selector, Tristate, sort_attributes,
};
pub use callback::CqueryOutputCallback;
pub use condition::{ConfigConditions, ConfigurationToken};
pub use encoder::{EncodedOutput, OutputEncoder, OutputMessage};
pub use error::{OutputError, OutputResult};
pub use options::{OutputFormat, OutputOptions};
pub use record::{
    QueriedTarget, ResolvedAttribute, TargetDescriptor, TargetKind, TargetRecord,
    TargetRecordBuilder,
};
pub use resolver::{AttributeResolver, ConfiguredAttributeResolver, ConfiguredAttributeView, Resolution};
