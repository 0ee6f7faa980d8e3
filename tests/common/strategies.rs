use proptest::prelude::*;

/// One caller action against a single order
#[derive(Debug, Clone)]
pub enum Op {
    Edit { actor: &'static str, text: String },
    Delete { actor: &'static str },
    Approve { actor: &'static str },
    Reject { actor: &'static str, comment: String },
    Execute { actor: &'static str },
    Cancel { actor: &'static str },
    Close { actor: &'static str },
}

/// Owner, a stranger, both reviewer steps and an admin
pub fn actor_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("alice"),
        Just("carol"),
        Just("bob"),
        Just("dan"),
        Just("root"),
    ]
}

/// Mostly usable text, sometimes blank
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "update t set a = [0-9]{1,3}",
        1 => Just("   ".to_string()),
    ]
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => (actor_strategy(), text_strategy()).prop_map(|(actor, text)| Op::Edit { actor, text }),
        1 => actor_strategy().prop_map(|actor| Op::Delete { actor }),
        3 => actor_strategy().prop_map(|actor| Op::Approve { actor }),
        1 => (actor_strategy(), text_strategy())
            .prop_map(|(actor, comment)| Op::Reject { actor, comment }),
        1 => actor_strategy().prop_map(|actor| Op::Execute { actor }),
        1 => actor_strategy().prop_map(|actor| Op::Cancel { actor }),
        1 => actor_strategy().prop_map(|actor| Op::Close { actor }),
    ]
}

pub fn op_sequence_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..24)
}
