//! Binary serialization of XRPL Payment transactions.
//!
//! Fields are written in canonical order (type code, then field code) with
//! the standard one- or two-byte field ids. Only the fields a simple
//! Payment carries are understood; anything else fails to decode.

use crate::address::AccountId;
use crate::amount::Amount;
use crate::error::XrpError;

const TT_PAYMENT: u16 = 0;

const TYPE_UINT16: u8 = 1;
const TYPE_UINT32: u8 = 2;
const TYPE_AMOUNT: u8 = 6;
const TYPE_BLOB: u8 = 7;
const TYPE_ACCOUNT: u8 = 8;

const FIELD_TRANSACTION_TYPE: (u8, u8) = (TYPE_UINT16, 2);
const FIELD_FLAGS: (u8, u8) = (TYPE_UINT32, 2);
const FIELD_SEQUENCE: (u8, u8) = (TYPE_UINT32, 4);
const FIELD_DESTINATION_TAG: (u8, u8) = (TYPE_UINT32, 14);
const FIELD_LAST_LEDGER_SEQUENCE: (u8, u8) = (TYPE_UINT32, 27);
const FIELD_AMOUNT: (u8, u8) = (TYPE_AMOUNT, 1);
const FIELD_FEE: (u8, u8) = (TYPE_AMOUNT, 8);
const FIELD_SIGNING_PUB_KEY: (u8, u8) = (TYPE_BLOB, 3);
const FIELD_TXN_SIGNATURE: (u8, u8) = (TYPE_BLOB, 4);
const FIELD_ACCOUNT: (u8, u8) = (TYPE_ACCOUNT, 1);
const FIELD_DESTINATION: (u8, u8) = (TYPE_ACCOUNT, 3);

/// Hash prefixes (`STX\0`, `TXN\0`).
pub const PREFIX_TX_SIGN: [u8; 4] = *b"STX\0";
pub const PREFIX_TX_ID: [u8; 4] = *b"TXN\0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub account: AccountId,
    pub destination: AccountId,
    pub amount: Amount,
    /// Fee in drops.
    pub fee: u64,
    pub sequence: u32,
    pub last_ledger_sequence: u32,
    pub flags: u32,
    pub destination_tag: Option<u32>,
    pub signing_pub_key: Option<Vec<u8>>,
    pub txn_signature: Option<Vec<u8>>,
}

fn field_id((type_code, field_code): (u8, u8), out: &mut Vec<u8>) {
    match (type_code < 16, field_code < 16) {
        (true, true) => out.push(type_code << 4 | field_code),
        (true, false) => {
            out.push(type_code << 4);
            out.push(field_code);
        }
        (false, true) => {
            out.push(field_code);
            out.push(type_code);
        }
        (false, false) => {
            out.push(0);
            out.push(type_code);
            out.push(field_code);
        }
    }
}

fn variable_length(len: usize, out: &mut Vec<u8>) -> Result<(), XrpError> {
    match len {
        0..=192 => out.push(len as u8),
        193..=12480 => {
            let l = len - 193;
            out.push(193 + (l >> 8) as u8);
            out.push((l & 0xFF) as u8);
        }
        _ => {
            return Err(XrpError::SerializationError(format!(
                "blob of {len} bytes is too long"
            )))
        }
    }
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], XrpError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| XrpError::SerializationError(format!("truncated at byte {}", self.pos)))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, XrpError> {
        Ok(self.take(1)?[0])
    }

    fn field_id(&mut self) -> Result<(u8, u8), XrpError> {
        let first = self.byte()?;
        let mut type_code = first >> 4;
        let mut field_code = first & 0x0F;
        if type_code == 0 {
            type_code = self.byte()?;
        }
        if field_code == 0 {
            field_code = self.byte()?;
        }
        Ok((type_code, field_code))
    }

    fn u16(&mut self) -> Result<u16, XrpError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, XrpError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn variable(&mut self) -> Result<&'a [u8], XrpError> {
        let first = self.byte()? as usize;
        let len = match first {
            0..=192 => first,
            193..=240 => 193 + ((first - 193) << 8) + self.byte()? as usize,
            _ => return Err(XrpError::SerializationError("unsupported length prefix".into())),
        };
        self.take(len)
    }

    fn account(&mut self) -> Result<AccountId, XrpError> {
        let raw = self.variable()?;
        AccountId::try_from(raw)
            .map_err(|_| XrpError::SerializationError(format!("account id of {} bytes", raw.len())))
    }

    fn amount(&mut self) -> Result<Amount, XrpError> {
        let (amount, used) = Amount::decode(&self.data[self.pos..])?;
        self.pos += used;
        Ok(amount)
    }
}

impl Payment {
    fn encode(&self, with_signature: bool) -> Result<Vec<u8>, XrpError> {
        let mut out = Vec::with_capacity(256);
        field_id(FIELD_TRANSACTION_TYPE, &mut out);
        out.extend_from_slice(&TT_PAYMENT.to_be_bytes());
        field_id(FIELD_FLAGS, &mut out);
        out.extend_from_slice(&self.flags.to_be_bytes());
        field_id(FIELD_SEQUENCE, &mut out);
        out.extend_from_slice(&self.sequence.to_be_bytes());
        if let Some(tag) = self.destination_tag {
            field_id(FIELD_DESTINATION_TAG, &mut out);
            out.extend_from_slice(&tag.to_be_bytes());
        }
        field_id(FIELD_LAST_LEDGER_SEQUENCE, &mut out);
        out.extend_from_slice(&self.last_ledger_sequence.to_be_bytes());
        field_id(FIELD_AMOUNT, &mut out);
        self.amount.encode(&mut out);
        field_id(FIELD_FEE, &mut out);
        Amount::Drops(self.fee).encode(&mut out);
        if let Some(key) = &self.signing_pub_key {
            field_id(FIELD_SIGNING_PUB_KEY, &mut out);
            variable_length(key.len(), &mut out)?;
            out.extend_from_slice(key);
        }
        if with_signature {
            if let Some(sig) = &self.txn_signature {
                field_id(FIELD_TXN_SIGNATURE, &mut out);
                variable_length(sig.len(), &mut out)?;
                out.extend_from_slice(sig);
            }
        }
        field_id(FIELD_ACCOUNT, &mut out);
        variable_length(20, &mut out)?;
        out.extend_from_slice(&self.account);
        field_id(FIELD_DESTINATION, &mut out);
        variable_length(20, &mut out)?;
        out.extend_from_slice(&self.destination);
        Ok(out)
    }

    /// Full serialization, signature included when present.
    pub fn to_bytes(&self) -> Result<Vec<u8>, XrpError> {
        self.encode(true)
    }

    /// Bytes covered by the signature: everything except `TxnSignature`.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, XrpError> {
        let mut out = PREFIX_TX_SIGN.to_vec();
        out.extend(self.encode(false)?);
        Ok(out)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, XrpError> {
        let mut r = Reader { data, pos: 0 };
        let mut tx_type = None;
        let mut flags = 0;
        let mut sequence = None;
        let mut destination_tag = None;
        let mut last_ledger_sequence = None;
        let mut amount = None;
        let mut fee = None;
        let mut signing_pub_key = None;
        let mut txn_signature = None;
        let mut account = None;
        let mut destination = None;

        let mut previous = (0u8, 0u8);
        while r.pos < data.len() {
            let id = r.field_id()?;
            if id <= previous {
                return Err(XrpError::SerializationError(format!("field {id:?} out of order")));
            }
            previous = id;
            match id {
                FIELD_TRANSACTION_TYPE => tx_type = Some(r.u16()?),
                FIELD_FLAGS => flags = r.u32()?,
                FIELD_SEQUENCE => sequence = Some(r.u32()?),
                FIELD_DESTINATION_TAG => destination_tag = Some(r.u32()?),
                FIELD_LAST_LEDGER_SEQUENCE => last_ledger_sequence = Some(r.u32()?),
                FIELD_AMOUNT => amount = Some(r.amount()?),
                FIELD_FEE => match r.amount()? {
                    Amount::Drops(d) => fee = Some(d),
                    Amount::Issued { .. } => {
                        return Err(XrpError::SerializationError("fee must be in drops".into()))
                    }
                },
                FIELD_SIGNING_PUB_KEY => signing_pub_key = Some(r.variable()?.to_vec()),
                FIELD_TXN_SIGNATURE => txn_signature = Some(r.variable()?.to_vec()),
                FIELD_ACCOUNT => account = Some(r.account()?),
                FIELD_DESTINATION => destination = Some(r.account()?),
                other => {
                    return Err(XrpError::SerializationError(format!("unsupported field {other:?}")))
                }
            }
        }

        if tx_type != Some(TT_PAYMENT) {
            return Err(XrpError::SerializationError("not a Payment".into()));
        }
        let missing = |name: &str| XrpError::SerializationError(format!("missing {name}"));
        Ok(Self {
            account: account.ok_or_else(|| missing("Account"))?,
            destination: destination.ok_or_else(|| missing("Destination"))?,
            amount: amount.ok_or_else(|| missing("Amount"))?,
            fee: fee.ok_or_else(|| missing("Fee"))?,
            sequence: sequence.ok_or_else(|| missing("Sequence"))?,
            last_ledger_sequence: last_ledger_sequence.ok_or_else(|| missing("LastLedgerSequence"))?,
            flags,
            destination_tag,
            signing_pub_key,
            txn_signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::decode_address;
    use crate::amount::{IouValue, IssuedToken};

    fn payment() -> Payment {
        Payment {
            account: decode_address("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh").unwrap(),
            destination: [0x11; 20],
            amount: Amount::Drops(25_000_000),
            fee: 12,
            sequence: 7,
            last_ledger_sequence: 1_000_020,
            flags: 0,
            destination_tag: None,
            signing_pub_key: None,
            txn_signature: None,
        }
    }

    #[test]
    fn field_ids() {
        let mut out = Vec::new();
        field_id(FIELD_TRANSACTION_TYPE, &mut out);
        field_id(FIELD_LAST_LEDGER_SEQUENCE, &mut out);
        field_id(FIELD_FEE, &mut out);
        field_id(FIELD_DESTINATION, &mut out);
        assert_eq!(out, vec![0x12, 0x20, 0x1B, 0x68, 0x83]);
    }

    #[test]
    fn unsigned_layout() {
        let bytes = payment().to_bytes().unwrap();
        assert_eq!(hex::encode_upper(&bytes[..13]), "12000022000000002400000007");
        assert_eq!(&bytes[13..18], &[0x20, 0x1B, 0x00, 0x0F, 0x42]);
        let tail = &bytes[bytes.len() - 22..];
        assert_eq!(tail[0], 0x83);
        assert_eq!(tail[1], 20);
        assert_eq!(Payment::from_bytes(&bytes).unwrap(), payment());
    }

    #[test]
    fn issued_amount_and_tag_decode() {
        let mut p = payment();
        p.destination_tag = Some(99);
        p.amount = Amount::Issued {
            value: IouValue::from_base_units(5_000_000).unwrap(),
            token: IssuedToken::parse("USD.rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh").unwrap(),
        };
        p.signing_pub_key = Some(vec![2; 33]);
        p.txn_signature = Some(vec![0x30; 70]);
        let bytes = p.to_bytes().unwrap();
        assert_eq!(Payment::from_bytes(&bytes).unwrap(), p);

        let mut unsigned = p.clone();
        unsigned.txn_signature = None;
        assert_eq!(&p.signing_bytes().unwrap()[4..], unsigned.to_bytes().unwrap().as_slice());
    }

    #[test]
    fn rejects_unknown_and_reordered_fields() {
        let bytes = payment().to_bytes().unwrap();
        let mut swapped = bytes[3..8].to_vec();
        swapped.extend_from_slice(&bytes[..3]);
        swapped.extend_from_slice(&bytes[8..]);
        assert!(Payment::from_bytes(&swapped).is_err());
        assert!(Payment::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(Payment::from_bytes(&[0x11, 0, 0]).is_err());
    }
}
