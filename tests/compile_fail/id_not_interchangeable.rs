// ABOUTME: Compile-fail test verifying TargetRef and OperationRef are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use ephem::types::{OperationRef, TargetRef};

fn takes_operation(_op: OperationRef) {}

fn main() {
    let target = TargetRef::new("ephem-test-standalone-20250116-143052");
    takes_operation(target); // ERROR: expected OperationRef, found TargetRef
}
