mod common;

mod reconcile;
