pub mod entity_ops;
