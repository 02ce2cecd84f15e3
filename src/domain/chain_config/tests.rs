//! 链注册表测试

use std::collections::HashMap;

use super::*;

#[test]
fn test_lookup_is_case_normalized() {
    let registry = ChainRegistry::new();

    let sol = registry.get_chain("SOL").unwrap();
    assert_eq!(sol.id, "solana");
    assert_eq!(sol.coin_type, 501);

    assert_eq!(registry.get_chain("  Solana ").unwrap().id, "solana");
    assert_eq!(registry.get_chain("ETH").unwrap().id, "ethereum");
    assert_eq!(registry.get_chain("btc").unwrap().coin_type, 0);
}

#[test]
fn test_unknown_chain_has_no_fallback() {
    let registry = ChainRegistry::new();

    match registry.get_chain("dogecoin") {
        Err(WalletError::UnknownChain(name)) => assert_eq!(name, "dogecoin"),
        other => panic!("expected UnknownChain, got {:?}", other),
    }
}

#[test]
fn test_reference_table_has_three_chain_types() {
    let registry = ChainRegistry::new();
    assert_eq!(registry.list_all().len(), 3);
    assert!(registry.validate_configs().is_ok());

    for chain_type in [ChainType::Solana, ChainType::Ethereum, ChainType::Bitcoin] {
        assert_eq!(registry.get_by_type(chain_type).unwrap().chain_type, chain_type);
    }
}

#[test]
fn test_derivation_paths() {
    let registry = ChainRegistry::new();

    assert_eq!(
        registry.get_chain("solana").unwrap().derivation_path(3),
        "m/44'/501'/3'/0'"
    );
    assert_eq!(
        registry.get_chain("ethereum").unwrap().derivation_path(0),
        "m/44'/60'/0'/0/0"
    );
    assert_eq!(
        registry.get_chain("bitcoin").unwrap().derivation_path(1),
        "m/84'/0'/1'/0/0"
    );
}

#[test]
fn test_endpoint_per_network() {
    let registry = ChainRegistry::new();
    let sol = registry.get_chain("solana").unwrap();

    assert_eq!(
        sol.endpoint(NetworkEnvironment::Devnet),
        "https://api.devnet.solana.com"
    );
    assert_eq!(
        sol.endpoint(NetworkEnvironment::Mainnet),
        "https://api.mainnet-beta.solana.com"
    );
}

#[test]
fn test_endpoint_overrides() {
    let mut overrides = HashMap::new();
    overrides.insert(
        "SOL.devnet".to_string(),
        "http://127.0.0.1:8899".to_string(),
    );
    let registry = ChainRegistry::with_overrides(&overrides).unwrap();
    assert_eq!(
        registry
            .get_chain("solana")
            .unwrap()
            .endpoint(NetworkEnvironment::Devnet),
        "http://127.0.0.1:8899"
    );

    let mut bad = HashMap::new();
    bad.insert("solana.localnet".to_string(), "http://x".to_string());
    assert!(matches!(
        ChainRegistry::with_overrides(&bad),
        Err(WalletError::Config(_))
    ));
}

#[test]
fn test_explorer_links() {
    let registry = ChainRegistry::new();
    let sol = registry.get_chain("solana").unwrap();

    assert_eq!(
        sol.explorer_tx_url("abc", NetworkEnvironment::Devnet),
        "https://explorer.solana.com/tx/abc?cluster=devnet"
    );
    assert_eq!(
        sol.explorer_tx_url("abc", NetworkEnvironment::Mainnet),
        "https://explorer.solana.com/tx/abc"
    );
}
