use super::messages::ExchangeMessageKind;
use super::record::ConnectionRecord;
use super::types::{ConnectionError, DidExchangeState, Role};

struct StateRule {
    message: ExchangeMessageKind,
    state: DidExchangeState,
    role: Role,
    next_state: DidExchangeState,
}

const CREATE_MESSAGE_RULES: [StateRule; 3] = [
    StateRule {
        message: ExchangeMessageKind::Request,
        state: DidExchangeState::InvitationReceived,
        role: Role::Requester,
        next_state: DidExchangeState::RequestSent,
    },
    StateRule {
        message: ExchangeMessageKind::Response,
        state: DidExchangeState::RequestReceived,
        role: Role::Responder,
        next_state: DidExchangeState::ResponseSent,
    },
    StateRule {
        message: ExchangeMessageKind::Complete,
        state: DidExchangeState::ResponseReceived,
        role: Role::Requester,
        next_state: DidExchangeState::Completed,
    },
];

const PROCESS_MESSAGE_RULES: [StateRule; 3] = [
    StateRule {
        message: ExchangeMessageKind::Request,
        state: DidExchangeState::InvitationSent,
        role: Role::Responder,
        next_state: DidExchangeState::RequestReceived,
    },
    StateRule {
        message: ExchangeMessageKind::Response,
        state: DidExchangeState::RequestSent,
        role: Role::Requester,
        next_state: DidExchangeState::ResponseReceived,
    },
    StateRule {
        message: ExchangeMessageKind::Complete,
        state: DidExchangeState::ResponseSent,
        role: Role::Responder,
        next_state: DidExchangeState::Completed,
    },
];

/// `DidExchangeStateMachine` is the transition table of the handshake
///
/// Each message has one rule on the sending side and one on the receiving side. A rule
/// is bound to a single role, so the same message can never be created or processed by
/// the other role. Nothing in here moves a record to `Abandoned`
pub struct DidExchangeStateMachine;

impl DidExchangeStateMachine {
    fn assert_rule(
        rules: &[StateRule],
        action: &str,
        message_type: &str,
        record: &ConnectionRecord,
    ) -> Result<(), ConnectionError> {
        let kind = ExchangeMessageKind::from_message_type(message_type)?;
        let rule = rules
            .iter()
            .find(|rule| rule.message == kind)
            .ok_or_else(|| {
                ConnectionError::InvalidState(format!(
                    "could not find {} message rule for {}",
                    action, message_type
                ))
            })?;

        if rule.state != record.state() || rule.role != record.role() {
            return Err(ConnectionError::InvalidState(format!(
                "record with role {} is in invalid state {} to {} {}, expected role {} in state {}",
                record.role(),
                record.state(),
                action,
                message_type,
                rule.role,
                rule.state
            )));
        }

        Ok(())
    }

    pub fn assert_create_message_state(
        message_type: &str,
        record: &ConnectionRecord,
    ) -> Result<(), ConnectionError> {
        Self::assert_rule(&CREATE_MESSAGE_RULES, "create", message_type, record)
    }

    pub fn assert_process_message_state(
        message_type: &str,
        record: &ConnectionRecord,
    ) -> Result<(), ConnectionError> {
        Self::assert_rule(&PROCESS_MESSAGE_RULES, "process", message_type, record)
    }

    /// Next state for the message and the role of the record, from either table
    pub fn next_state(
        message_type: &str,
        record: &ConnectionRecord,
    ) -> Result<DidExchangeState, ConnectionError> {
        let kind = ExchangeMessageKind::from_message_type(message_type)?;

        CREATE_MESSAGE_RULES
            .iter()
            .chain(PROCESS_MESSAGE_RULES.iter())
            .find(|rule| rule.message == kind && rule.role == record.role())
            .map(|rule| rule.next_state)
            .ok_or_else(|| {
                ConnectionError::InvalidState(format!(
                    "could not find next state for {} with role {}",
                    message_type,
                    record.role()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use table_test::table_test;

    use super::super::messages::{
        COMPLETE_MESSAGE_TYPE, PROBLEM_REPORT_MESSAGE_TYPE, REQUEST_MESSAGE_TYPE,
        RESPONSE_MESSAGE_TYPE,
    };

    fn record(role: Role, state: DidExchangeState) -> ConnectionRecord {
        ConnectionRecord::new(role, state, "oob-1")
    }

    #[test]
    fn test_assert_create_message_state() {
        let table = vec![
            ((REQUEST_MESSAGE_TYPE, Role::Requester, DidExchangeState::InvitationReceived), true),
            ((REQUEST_MESSAGE_TYPE, Role::Responder, DidExchangeState::InvitationReceived), false),
            ((REQUEST_MESSAGE_TYPE, Role::Requester, DidExchangeState::RequestSent), false),
            ((RESPONSE_MESSAGE_TYPE, Role::Responder, DidExchangeState::RequestReceived), true),
            ((RESPONSE_MESSAGE_TYPE, Role::Requester, DidExchangeState::RequestSent), false),
            ((COMPLETE_MESSAGE_TYPE, Role::Requester, DidExchangeState::ResponseReceived), true),
            ((COMPLETE_MESSAGE_TYPE, Role::Responder, DidExchangeState::ResponseSent), false),
            ((PROBLEM_REPORT_MESSAGE_TYPE, Role::Requester, DidExchangeState::RequestSent), false),
        ];

        for (validator, (message_type, role, state), expected) in table_test!(table) {
            let result =
                DidExchangeStateMachine::assert_create_message_state(message_type, &record(role, state));

            validator
                .given(&format!("{} as {} in {}", message_type, role, state))
                .when("assert create message state")
                .then(&format!("allowed: {}", expected))
                .assert_eq(expected, result.is_ok());
        }
    }

    #[test]
    fn test_assert_process_message_state() {
        let table = vec![
            ((REQUEST_MESSAGE_TYPE, Role::Responder, DidExchangeState::InvitationSent), true),
            ((REQUEST_MESSAGE_TYPE, Role::Requester, DidExchangeState::InvitationReceived), false),
            ((RESPONSE_MESSAGE_TYPE, Role::Requester, DidExchangeState::RequestSent), true),
            ((RESPONSE_MESSAGE_TYPE, Role::Requester, DidExchangeState::ResponseReceived), false),
            ((COMPLETE_MESSAGE_TYPE, Role::Responder, DidExchangeState::ResponseSent), true),
            ((COMPLETE_MESSAGE_TYPE, Role::Responder, DidExchangeState::Completed), false),
        ];

        for (validator, (message_type, role, state), expected) in table_test!(table) {
            let result = DidExchangeStateMachine::assert_process_message_state(
                message_type,
                &record(role, state),
            );

            validator
                .given(&format!("{} as {} in {}", message_type, role, state))
                .when("assert process message state")
                .then(&format!("allowed: {}", expected))
                .assert_eq(expected, result.is_ok());
        }
    }

    #[test]
    fn test_next_state() {
        let table = vec![
            ((REQUEST_MESSAGE_TYPE, Role::Requester), Some(DidExchangeState::RequestSent)),
            ((REQUEST_MESSAGE_TYPE, Role::Responder), Some(DidExchangeState::RequestReceived)),
            ((RESPONSE_MESSAGE_TYPE, Role::Responder), Some(DidExchangeState::ResponseSent)),
            ((RESPONSE_MESSAGE_TYPE, Role::Requester), Some(DidExchangeState::ResponseReceived)),
            ((COMPLETE_MESSAGE_TYPE, Role::Requester), Some(DidExchangeState::Completed)),
            ((COMPLETE_MESSAGE_TYPE, Role::Responder), Some(DidExchangeState::Completed)),
            (("https://didcomm.org/didexchange/1.0/complete", Role::Responder), Some(DidExchangeState::Completed)),
            ((PROBLEM_REPORT_MESSAGE_TYPE, Role::Requester), None),
            (("https://didcomm.org/connections/1.0/request", Role::Requester), None),
        ];

        for (validator, (message_type, role), expected) in table_test!(table) {
            let state = DidExchangeStateMachine::next_state(
                message_type,
                &record(role, DidExchangeState::InvitationReceived),
            )
            .ok();

            validator
                .given(&format!("{} as {}", message_type, role))
                .when("resolve next state")
                .then(&format!("it should be {:?}", expected))
                .assert_eq(expected, state);
        }
    }

    #[test]
    fn test_mismatch_message() {
        let err = DidExchangeStateMachine::assert_create_message_state(
            RESPONSE_MESSAGE_TYPE,
            &record(Role::Requester, DidExchangeState::RequestSent),
        )
        .unwrap_err();

        assert!(matches!(err, ConnectionError::InvalidState(_)));
        assert!(err.to_string().contains("request-sent"));
    }
}
