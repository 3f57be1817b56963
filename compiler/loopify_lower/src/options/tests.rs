use pretty_assertions::assert_eq;

use super::*;

#[test]
fn defaults() {
    let options = LowerOptions::default();
    assert!(!options.allow_opaque_sources);
    assert_eq!(options.label_base_for(false), "outer");
    assert_eq!(options.label_base_for(true), "inner");
}

#[test]
fn builder_setters() {
    let options = LowerOptions::new()
        .with_opaque_sources(true)
        .with_label_base("loop")
        .with_nested_label_base("sub");
    assert!(options.allow_opaque_sources);
    assert_eq!(options.label_base_for(false), "loop");
    assert_eq!(options.label_base_for(true), "sub");
}
