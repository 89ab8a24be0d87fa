use super::*;

#[test]
fn exit_outcome_codes_match_the_documented_contract() {
    assert_eq!(ExitOutcome::Normal.code(), 0);
    assert_eq!(ExitOutcome::ConfigInvalid.code(), 2);
    assert_eq!(ExitOutcome::FailurePressureAbort.code(), 3);
    assert_eq!(ExitOutcome::FatalSpawnError.code(), 4);
}

#[test]
fn dispatch_error_maps_to_the_matching_grpc_status_code() {
    use tonic::Code;

    assert_eq!(DispatchError::Unavailable.into_status().code(), Code::ResourceExhausted);
    assert_eq!(DispatchError::DeadlineExceeded.into_status().code(), Code::DeadlineExceeded);
    assert_eq!(DispatchError::Cancelled.into_status().code(), Code::Cancelled);
    assert_eq!(DispatchError::ChildDied.into_status().code(), Code::Internal);
}
