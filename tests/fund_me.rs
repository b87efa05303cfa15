mod support;

use ethers::types::{Bytes, I256, U256};
use fundme_deploy::chain::TxRequest;
use fundme_deploy::contracts::FundMeContract;
use fundme_deploy::devnet::{BELOW_MINIMUM, NOT_OWNER};
use fundme_deploy::{ChainClient, ChainError, Revert, TxReceipt};

use support::{minimum_value, send_value, setup, Harness};

#[derive(Clone, Copy)]
enum Withdrawal {
    Regular,
    Cheaper,
}

async fn withdraw(fund_me: &FundMeContract, withdrawal: Withdrawal) -> Result<TxReceipt, ChainError> {
    match withdrawal {
        Withdrawal::Regular => fund_me.withdraw().await,
        Withdrawal::Cheaper => fund_me.cheaper_withdraw().await,
    }
}

fn assert_below_minimum(result: Result<TxReceipt, ChainError>) {
    let err = result.unwrap_err();
    assert_eq!(err.revert(), Some(&Revert::Reason(BELOW_MINIMUM.to_string())));
}

#[tokio::test]
async fn test_constructor_sets_price_feed() {
    let h = setup().await;

    assert_eq!(h.fund_me.get_price_feed().await.unwrap(), h.price_feed.address());
    assert_eq!(h.fund_me.get_owner().await.unwrap(), h.deployer);
    assert_eq!(h.fund_me.get_version().await.unwrap(), U256::zero());
    assert_eq!(
        h.fund_me.minimum_usd().await.unwrap(),
        U256::from(50) * U256::exp10(18)
    );
}

#[tokio::test]
async fn test_fund_fails_without_value() {
    let h = setup().await;

    assert_below_minimum(h.fund_me.fund(U256::zero()).await);
    assert!(h.fund_me.balance().await.unwrap().is_zero());
}

#[tokio::test]
async fn test_fund_minimum_boundary() {
    let h = setup().await;

    assert_below_minimum(h.fund_me.fund(minimum_value() - 1).await);
    h.fund_me.fund(minimum_value()).await.unwrap();
    assert_eq!(
        h.fund_me.get_address_to_amount_funded(h.deployer).await.unwrap(),
        minimum_value()
    );
}

#[tokio::test]
async fn test_fund_updates_amount_funded() {
    let h = setup().await;

    h.fund_me.fund(send_value()).await.unwrap();

    let amount = h.fund_me.get_address_to_amount_funded(h.deployer).await.unwrap();
    assert_eq!(amount, send_value());
}

#[tokio::test]
async fn test_fund_appends_funder() {
    let h = setup().await;

    h.fund_me.fund(send_value()).await.unwrap();

    assert_eq!(h.fund_me.get_funder(0).await.unwrap(), h.deployer);
    assert!(h.fund_me.get_funder(1).await.unwrap_err().revert().unwrap().is_out_of_bounds());
}

#[tokio::test]
async fn test_repeated_funding_accumulates() {
    let h = setup().await;

    h.fund_me.fund(send_value()).await.unwrap();
    h.fund_me.fund(send_value()).await.unwrap();

    assert_eq!(
        h.fund_me.get_address_to_amount_funded(h.deployer).await.unwrap(),
        send_value() * 2
    );
    assert_eq!(h.fund_me.funders().await.unwrap(), vec![h.deployer, h.deployer]);
}

#[tokio::test]
async fn test_plain_transfer_funds() {
    let h = setup().await;
    let sender = h.accounts[3];

    // Send value without calldata, the receive path
    h.env
        .client()
        .send(TxRequest {
            from: sender,
            to: h.fund_me.address(),
            data: Bytes::new(),
            value: send_value(),
            confirmations: 1,
        })
        .await
        .unwrap();

    assert_eq!(h.fund_me.get_funder(0).await.unwrap(), sender);
    assert_eq!(h.fund_me.balance().await.unwrap(), send_value());
}

#[tokio::test]
async fn test_price_drop_raises_minimum() {
    let h = setup().await;

    // 0.04 ETH is 80 USD at 2000 USD/ETH but 40 USD at 1000 USD/ETH
    let value = U256::from(4) * U256::exp10(16);
    h.fund_me.fund(value).await.unwrap();

    h.price_feed
        .update_answer(I256::from(100_000_000_000i64))
        .await
        .unwrap();
    assert_below_minimum(h.fund_me.fund(value).await);
}

async fn check_single_funder_withdrawal(withdrawal: Withdrawal) {
    let h = setup().await;
    h.fund_me.fund(send_value()).await.unwrap();

    // Arrange
    let starting_contract_balance = h.fund_me.balance().await.unwrap();
    let starting_deployer_balance = h.balance(h.deployer).await;

    // Act
    let receipt = withdraw(&h.fund_me, withdrawal).await.unwrap();
    let gas_cost = receipt.gas_cost();

    // Assert
    assert!(h.fund_me.balance().await.unwrap().is_zero());
    assert_eq!(
        h.balance(h.deployer).await + gas_cost,
        starting_deployer_balance + starting_contract_balance
    );
}

async fn check_multiple_funders_withdrawal(withdrawal: Withdrawal) -> Harness {
    let h = setup().await;
    h.fund_me.fund(send_value()).await.unwrap();
    let funders = h.fund_from_others(5, send_value()).await;

    // Arrange
    let starting_contract_balance = h.fund_me.balance().await.unwrap();
    let starting_deployer_balance = h.balance(h.deployer).await;
    assert_eq!(starting_contract_balance, send_value() * 6);

    // Act
    let receipt = withdraw(&h.fund_me, withdrawal).await.unwrap();

    // Assert
    assert!(h.fund_me.balance().await.unwrap().is_zero());
    assert_eq!(
        h.balance(h.deployer).await + receipt.gas_cost(),
        starting_deployer_balance + starting_contract_balance
    );

    // The funder list is reset
    let err = h.fund_me.get_funder(0).await.unwrap_err();
    assert_eq!(
        err.revert(),
        Some(&Revert::Panic(U256::from(Revert::ARRAY_OUT_OF_BOUNDS)))
    );

    // Every recorded amount is zero
    for funder in &funders {
        assert!(h
            .fund_me
            .get_address_to_amount_funded(*funder)
            .await
            .unwrap()
            .is_zero());
    }

    let snapshot = h.fund_me.snapshot(&funders).await.unwrap();
    assert!(snapshot.is_cleared());
    h
}

async fn check_only_owner_withdraws(withdrawal: Withdrawal) {
    let h = setup().await;
    h.fund_me.fund(send_value()).await.unwrap();

    let attacker = h.fund_me.connect(h.accounts[1]);
    let err = withdraw(&attacker, withdrawal).await.unwrap_err();
    assert_eq!(err.revert(), Some(&Revert::CustomError(NOT_OWNER.to_string())));

    // Nothing moved
    assert_eq!(h.fund_me.balance().await.unwrap(), send_value());
    assert_eq!(h.fund_me.get_funder(0).await.unwrap(), h.deployer);
}

#[tokio::test]
async fn test_withdraw_single_funder() {
    check_single_funder_withdrawal(Withdrawal::Regular).await;
}

#[tokio::test]
async fn test_withdraw_multiple_funders() {
    check_multiple_funders_withdrawal(Withdrawal::Regular).await;
}

#[tokio::test]
async fn test_withdraw_only_owner() {
    check_only_owner_withdraws(Withdrawal::Regular).await;
}

#[tokio::test]
async fn test_cheaper_withdraw_single_funder() {
    check_single_funder_withdrawal(Withdrawal::Cheaper).await;
}

#[tokio::test]
async fn test_cheaper_withdraw_multiple_funders() {
    check_multiple_funders_withdrawal(Withdrawal::Cheaper).await;
}

#[tokio::test]
async fn test_cheaper_withdraw_only_owner() {
    check_only_owner_withdraws(Withdrawal::Cheaper).await;
}

#[tokio::test]
async fn test_withdrawn_contract_accepts_funding_again() {
    let h = check_multiple_funders_withdrawal(Withdrawal::Regular).await;

    let funder = h.accounts[7];
    h.fund_me.connect(funder).fund(send_value()).await.unwrap();

    assert_eq!(h.fund_me.funders().await.unwrap(), vec![funder]);
    assert_eq!(h.fund_me.balance().await.unwrap(), send_value());
}

#[tokio::test]
async fn test_cheaper_withdraw_costs_less_gas() {
    let regular = setup().await;
    regular.fund_from_others(5, send_value()).await;
    let regular_receipt = regular.fund_me.withdraw().await.unwrap();

    let cheaper = setup().await;
    cheaper.fund_from_others(5, send_value()).await;
    let cheaper_receipt = cheaper.fund_me.cheaper_withdraw().await.unwrap();

    assert!(cheaper_receipt.gas_used < regular_receipt.gas_used);
}
