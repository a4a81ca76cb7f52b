//! Separated-pseudogenome persistence.
//!
//! A pseudogenome and its matched reads list are stored as a bundle of
//! parallel files sharing one path prefix: the raw sequence, a properties
//! header, and one stream per reads-list column.  Writers always target
//! `name + ".temp"` and promote the whole bundle at build time, so an
//! interrupted run never clobbers a previous result.

pub mod output_builder;
pub mod persistence;
pub mod properties;
pub mod reads_list;
