//! 交易构建和签名验证测试

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::*;
use crate::domain::chain_config::ChainRegistry;
use crate::domain::derivation::KeyDerivationEngine;
use crate::domain::mnemonic::MnemonicEngine;

const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const RECIPIENT: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

fn fee() -> FeeEstimate {
    FeeEstimate {
        base_fee: 5_000,
        priority_fee: 50_000,
        compute_unit_limit: 200_000,
        compute_unit_price_micro_lamports: 250_000,
    }
}

fn sender() -> DerivedKeypair {
    let registry = ChainRegistry::new();
    let seed = MnemonicEngine::derive(TEST_MNEMONIC, "").unwrap();
    KeyDerivationEngine::derive_keypair(&seed, registry.get_chain("solana").unwrap(), 0).unwrap()
}

fn blockhash() -> String {
    bs58::encode([7u8; 32]).into_string()
}

#[test]
fn test_shortvec_encoding() {
    let cases: [(usize, &[u8]); 5] = [
        (0, &[0x00]),
        (0x7f, &[0x7f]),
        (0x80, &[0x80, 0x01]),
        (0x3fff, &[0xff, 0x7f]),
        (0x4000, &[0x80, 0x80, 0x01]),
    ];
    for (len, expected) in cases {
        let mut buf = Vec::new();
        encode_shortvec_len(&mut buf, len).unwrap();
        assert_eq!(buf, expected, "len {}", len);
    }

    assert!(encode_shortvec_len(&mut Vec::new(), 0x1_0000).is_err());
}

#[test]
fn test_instruction_data_layout() {
    let limit = Instruction::set_compute_unit_limit(200_000).unwrap();
    assert_eq!(limit.data, [2, 0x40, 0x0d, 0x03, 0x00]);
    assert!(limit.accounts.is_empty());

    let price = Instruction::set_compute_unit_price(250_000).unwrap();
    assert_eq!(price.data, [3, 0x90, 0xd0, 0x03, 0, 0, 0, 0, 0]);

    let transfer = Instruction::transfer([1u8; 32], [2u8; 32], 1_500_000_000);
    assert_eq!(&transfer.data[..4], &[2, 0, 0, 0]);
    assert_eq!(&transfer.data[4..], &1_500_000_000u64.to_le_bytes());
    assert_eq!(transfer.program_id, SYSTEM_PROGRAM_ID);
}

#[test]
fn test_transfer_message_layout() {
    let keypair = sender();
    let message = SolanaTransactionBuilder::build_transfer(
        &SolanaTransfer {
            from: &keypair.address,
            to: RECIPIENT,
            lamports: 1_500_000_000,
            recent_blockhash: &blockhash(),
        },
        &fee(),
    )
    .unwrap();

    // 一个签名，无只读签名账户，两个只读程序账户
    assert_eq!(message.header, [1, 0, 2]);
    assert_eq!(message.account_keys.len(), 4);
    assert_eq!(message.account_keys[0].as_slice(), keypair.public_key.as_slice());
    assert_eq!(message.account_keys[1], decode_pubkey(RECIPIENT).unwrap());
    assert_eq!(
        message.account_keys[2],
        decode_pubkey(COMPUTE_BUDGET_PROGRAM).unwrap()
    );
    assert_eq!(message.account_keys[3], SYSTEM_PROGRAM_ID);
    assert_eq!(message.recent_blockhash, [7u8; 32]);

    // 计算预算指令在转账之前
    assert_eq!(message.instructions.len(), 3);
    assert_eq!(message.instructions[0].program_id_index, 2);
    assert_eq!(message.instructions[1].program_id_index, 2);
    assert_eq!(message.instructions[2].program_id_index, 3);
    assert_eq!(message.instructions[2].accounts, vec![0, 1]);
}

#[test]
fn test_self_transfer_merges_accounts() {
    let keypair = sender();
    let message = SolanaTransactionBuilder::build_transfer(
        &SolanaTransfer {
            from: &keypair.address,
            to: &keypair.address,
            lamports: 1,
            recent_blockhash: &blockhash(),
        },
        &fee(),
    )
    .unwrap();

    assert_eq!(message.header, [1, 0, 2]);
    assert_eq!(message.account_keys.len(), 3);
    assert_eq!(message.instructions[2].accounts, vec![0, 0]);
}

#[test]
fn test_sign_and_serialize() {
    let keypair = sender();
    let message = SolanaTransactionBuilder::build_transfer(
        &SolanaTransfer {
            from: &keypair.address,
            to: RECIPIENT,
            lamports: 42,
            recent_blockhash: &blockhash(),
        },
        &fee(),
    )
    .unwrap();

    let signed = SolanaTransactionBuilder::sign(&message, &keypair).unwrap();
    let wire = signed.serialize().unwrap();

    assert_eq!(wire[0], 1);
    assert_eq!(&wire[65..], message.serialize().unwrap().as_slice());

    let public: [u8; 32] = keypair.public_key.as_slice().try_into().unwrap();
    let signature = Signature::from_slice(&wire[1..65]).unwrap();
    assert!(VerifyingKey::from_bytes(&public)
        .unwrap()
        .verify(&wire[65..], &signature)
        .is_ok());

    assert_eq!(
        signed.transaction_id().unwrap(),
        bs58::encode(&wire[1..65]).into_string()
    );
}

#[test]
fn test_sign_rejects_foreign_key() {
    let keypair = sender();
    let message = SolanaTransactionBuilder::build_transfer(
        &SolanaTransfer {
            from: RECIPIENT,
            to: &keypair.address,
            lamports: 42,
            recent_blockhash: &blockhash(),
        },
        &fee(),
    )
    .unwrap();

    assert!(matches!(
        SolanaTransactionBuilder::sign(&message, &keypair),
        Err(WalletError::CryptoOperationFailed(_))
    ));
}

#[test]
fn test_invalid_inputs() {
    let result = SolanaTransactionBuilder::build_transfer(
        &SolanaTransfer {
            from: RECIPIENT,
            to: "not-base58-0OIl",
            lamports: 1,
            recent_blockhash: &blockhash(),
        },
        &fee(),
    );
    assert!(matches!(result, Err(WalletError::InvalidAddress { .. })));

    let result = SolanaTransactionBuilder::build_transfer(
        &SolanaTransfer {
            from: RECIPIENT,
            to: RECIPIENT,
            lamports: 1,
            recent_blockhash: "abc",
        },
        &fee(),
    );
    assert!(matches!(result, Err(WalletError::NetworkError(_))));
}
