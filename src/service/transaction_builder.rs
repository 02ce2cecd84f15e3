//! Solana 交易构建器
//!
//! 构建 legacy 格式的原生转账交易：计算预算指令（单元上限、单元价格）在前，
//! 系统转账指令在后，发送方作为手续费支付者。

use serde::{Deserialize, Serialize};

use crate::domain::derivation::DerivedKeypair;
use crate::error::{WalletError, WalletResult};
use crate::service::fee_service::FeeEstimate;

pub type Pubkey = [u8; 32];

/// System Program: 11111111111111111111111111111111
pub const SYSTEM_PROGRAM_ID: Pubkey = [0u8; 32];

/// Compute Budget Program 的 base58 地址
pub const COMPUTE_BUDGET_PROGRAM: &str = "ComputeBudget111111111111111111111111111111";

const SET_COMPUTE_UNIT_LIMIT: u8 = 2;
const SET_COMPUTE_UNIT_PRICE: u8 = 3;
const SYSTEM_TRANSFER: u32 = 2;

/// base58 公钥解码
pub fn decode_pubkey(address: &str) -> WalletResult<Pubkey> {
    bs58::decode(address)
        .into_vec()
        .ok()
        .and_then(|bytes| Pubkey::try_from(bytes.as_slice()).ok())
        .ok_or_else(|| WalletError::InvalidAddress {
            chain: "solana".to_string(),
            address: address.to_string(),
        })
}

/// compact-u16 长度编码
pub fn encode_shortvec_len(buf: &mut Vec<u8>, len: usize) -> WalletResult<()> {
    let mut rem = u16::try_from(len).map_err(|_| {
        WalletError::CryptoOperationFailed(format!("Length {} exceeds compact-u16", len))
    })?;

    loop {
        let mut elem = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            buf.push(elem);
            return Ok(());
        }
        elem |= 0x80;
        buf.push(elem);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn set_compute_unit_limit(units: u32) -> WalletResult<Self> {
        let mut data = vec![SET_COMPUTE_UNIT_LIMIT];
        data.extend_from_slice(&units.to_le_bytes());
        Ok(Self {
            program_id: decode_pubkey(COMPUTE_BUDGET_PROGRAM)?,
            accounts: Vec::new(),
            data,
        })
    }

    pub fn set_compute_unit_price(micro_lamports: u64) -> WalletResult<Self> {
        let mut data = vec![SET_COMPUTE_UNIT_PRICE];
        data.extend_from_slice(&micro_lamports.to_le_bytes());
        Ok(Self {
            program_id: decode_pubkey(COMPUTE_BUDGET_PROGRAM)?,
            accounts: Vec::new(),
            data,
        })
    }

    pub fn transfer(from: Pubkey, to: Pubkey, lamports: u64) -> Self {
        let mut data = SYSTEM_TRANSFER.to_le_bytes().to_vec();
        data.extend_from_slice(&lamports.to_le_bytes());
        Self {
            program_id: SYSTEM_PROGRAM_ID,
            accounts: vec![
                AccountMeta {
                    pubkey: from,
                    is_signer: true,
                    is_writable: true,
                },
                AccountMeta {
                    pubkey: to,
                    is_signer: false,
                    is_writable: true,
                },
            ],
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// legacy 消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// [签名数, 只读签名账户数, 只读非签名账户数]
    pub header: [u8; 3],
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// 编译指令：合并重复账户，按 可写签名 / 只读签名 / 可写非签名 / 只读非签名 排序
    pub fn compile(
        payer: Pubkey,
        instructions: &[Instruction],
        recent_blockhash: [u8; 32],
    ) -> WalletResult<Self> {
        let mut metas: Vec<AccountMeta> = vec![AccountMeta {
            pubkey: payer,
            is_signer: true,
            is_writable: true,
        }];

        let mut upsert = |meta: AccountMeta| {
            match metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                Some(existing) => {
                    existing.is_signer |= meta.is_signer;
                    existing.is_writable |= meta.is_writable;
                }
                None => metas.push(meta),
            }
        };

        for ix in instructions {
            for account in &ix.accounts {
                upsert(account.clone());
            }
            upsert(AccountMeta {
                pubkey: ix.program_id,
                is_signer: false,
                is_writable: false,
            });
        }

        let group = |signer: bool, writable: bool| {
            metas
                .iter()
                .filter(move |m| m.is_signer == signer && m.is_writable == writable)
                .map(|m| m.pubkey)
        };

        let writable_signed: Vec<Pubkey> = group(true, true).collect();
        let readonly_signed: Vec<Pubkey> = group(true, false).collect();
        let writable_unsigned: Vec<Pubkey> = group(false, true).collect();
        let readonly_unsigned: Vec<Pubkey> = group(false, false).collect();

        let to_u8 = |n: usize| {
            u8::try_from(n).map_err(|_| {
                WalletError::CryptoOperationFailed("Too many accounts in message".to_string())
            })
        };

        let header = [
            to_u8(writable_signed.len() + readonly_signed.len())?,
            to_u8(readonly_signed.len())?,
            to_u8(readonly_unsigned.len())?,
        ];

        let account_keys: Vec<Pubkey> = writable_signed
            .into_iter()
            .chain(readonly_signed)
            .chain(writable_unsigned)
            .chain(readonly_unsigned)
            .collect();
        to_u8(account_keys.len())?;

        let index_of = |key: &Pubkey| -> WalletResult<u8> {
            account_keys
                .iter()
                .position(|k| k == key)
                .ok_or_else(|| {
                    WalletError::CryptoOperationFailed("Account missing from message".to_string())
                })
                .and_then(to_u8)
        };

        let compiled = instructions
            .iter()
            .map(|ix| {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|a| index_of(&a.pubkey))
                        .collect::<WalletResult<Vec<u8>>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<WalletResult<Vec<_>>>()?;

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// 序列化为待签名字节
    pub fn serialize(&self) -> WalletResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&self.header);

        encode_shortvec_len(&mut buf, self.account_keys.len())?;
        for key in &self.account_keys {
            buf.extend_from_slice(key);
        }

        buf.extend_from_slice(&self.recent_blockhash);

        encode_shortvec_len(&mut buf, self.instructions.len())?;
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            encode_shortvec_len(&mut buf, ix.accounts.len())?;
            buf.extend_from_slice(&ix.accounts);
            encode_shortvec_len(&mut buf, ix.data.len())?;
            buf.extend_from_slice(&ix.data);
        }

        Ok(buf)
    }

    pub fn num_required_signatures(&self) -> usize {
        usize::from(self.header[0])
    }
}

/// 已签名交易
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub signatures: Vec<Vec<u8>>,
    pub message: Vec<u8>,
}

impl SignedTransaction {
    /// 线上字节：shortvec(签名数) || 签名 || 消息
    pub fn serialize(&self) -> WalletResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(1 + self.signatures.len() * 64 + self.message.len());
        encode_shortvec_len(&mut buf, self.signatures.len())?;
        for signature in &self.signatures {
            buf.extend_from_slice(signature);
        }
        buf.extend_from_slice(&self.message);
        Ok(buf)
    }

    /// 第一个签名即交易 id
    pub fn transaction_id(&self) -> Option<String> {
        self.signatures
            .first()
            .map(|sig| bs58::encode(sig).into_string())
    }
}

/// 原生转账参数
#[derive(Debug, Clone)]
pub struct SolanaTransfer<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub lamports: u64,
    pub recent_blockhash: &'a str,
}

pub struct SolanaTransactionBuilder;

impl SolanaTransactionBuilder {
    /// 构建转账消息（计算预算指令在前，转账在后）
    pub fn build_transfer(transfer: &SolanaTransfer<'_>, fee: &FeeEstimate) -> WalletResult<Message> {
        let from = decode_pubkey(transfer.from)?;
        let to = decode_pubkey(transfer.to)?;
        let blockhash = bs58::decode(transfer.recent_blockhash)
            .into_vec()
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| {
                WalletError::NetworkError(format!(
                    "Invalid recent blockhash: {}",
                    transfer.recent_blockhash
                ))
            })?;

        let instructions = [
            Instruction::set_compute_unit_limit(fee.compute_unit_limit)?,
            Instruction::set_compute_unit_price(fee.compute_unit_price_micro_lamports)?,
            Instruction::transfer(from, to, transfer.lamports),
        ];

        Message::compile(from, &instructions, blockhash)
    }

    /// 用派生密钥签名（只有手续费支付者一个签名）
    pub fn sign(message: &Message, keypair: &DerivedKeypair) -> WalletResult<SignedTransaction> {
        let payer = message.account_keys.first().ok_or_else(|| {
            WalletError::CryptoOperationFailed("Message has no fee payer".to_string())
        })?;

        if message.num_required_signatures() != 1 || keypair.public_key.as_slice() != payer {
            return Err(WalletError::CryptoOperationFailed(
                "Signing key does not match the fee payer".to_string(),
            ));
        }

        let message_bytes = message.serialize()?;
        let signature = keypair.sign_ed25519(&message_bytes)?;

        Ok(SignedTransaction {
            signatures: vec![signature.to_vec()],
            message: message_bytes,
        })
    }
}

#[cfg(test)]
mod tests;
