use super::*;
use crate::fakes::{account, FakeWallet};
use dao_shared::domain::{AGENT_FACTORY_ADDRESS, GOVERNOR_ADDRESS, TOKEN_ADDRESS};

#[test]
fn bindings_carry_kind_address_and_session_account() {
    let wallet = FakeWallet::with_accounts(vec![account(1)]);
    let bindings = SessionBindings::bind(&wallet, &ContractAddresses::default(), account(1));

    assert_eq!(bindings.token.kind(), ContractKind::Token);
    assert_eq!(bindings.token.address(), TOKEN_ADDRESS);
    assert_eq!(bindings.governor.address(), GOVERNOR_ADDRESS);
    assert_eq!(bindings.agent_factory.address(), AGENT_FACTORY_ADDRESS);
    assert_eq!(bindings.governor.abi_name(), "AiDaoGovernor");
    assert!(
        [
            bindings.token.account(),
            bindings.governor.account(),
            bindings.agent_factory.account()
        ]
        .iter()
        .all(|bound| *bound == account(1))
    );
}

#[test]
fn custom_addresses_are_respected() {
    let wallet = FakeWallet::with_accounts(vec![account(1)]);
    let addresses = ContractAddresses {
        token: account(0x10),
        governor: account(0x20),
        agent_factory: account(0x30),
    };
    let bindings = SessionBindings::bind(&wallet, &addresses, account(1));
    assert_eq!(bindings.token.address(), account(0x10));
    assert_eq!(bindings.governor.address(), account(0x20));
    assert_eq!(bindings.agent_factory.address(), account(0x30));
}

#[test]
fn signalling_proposal_has_no_actions() {
    let request = ProposalRequest::signalling("fund the grants round");
    assert!(request.targets.is_empty());
    assert!(request.values.is_empty());
    assert!(request.calldatas.is_empty());
    assert_eq!(request.description, "fund the grants round");
}

#[test]
fn contract_errors_render_their_cause() {
    assert_eq!(
        ContractError::Rejected("user denied account access".into()).to_string(),
        "request rejected: user denied account access"
    );
    assert_eq!(
        ContractError::Dropped.to_string(),
        "transaction dropped from mempool"
    );
}
