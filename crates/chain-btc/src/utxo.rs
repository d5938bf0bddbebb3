use crate::error::BtcError;

/// A single unspent transaction output (UTXO).
#[derive(Debug, Clone)]
pub struct Utxo {
    /// Transaction ID as a hex string (big-endian / display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub amount_sat: u64,
    /// The locking script (scriptPubKey) serialized bytes.
    pub script_pubkey: Vec<u8>,
}

/// Result of UTXO selection: the chosen UTXOs and their aggregate value.
#[derive(Debug, Clone)]
pub struct UtxoSelection {
    /// The selected UTXOs.
    pub selected: Vec<Utxo>,
    /// Total value of the selected UTXOs in satoshis.
    pub total_sat: u64,
}

/// Select UTXOs to cover `target_sat` plus estimated fees.
///
/// Largest-first coin selection, ties broken by outpoint so the same UTXO set
/// always yields the same inputs. The fee assumes P2WPKH inputs and two
/// outputs (recipient + change).
pub fn select_utxos(
    utxos: &[Utxo],
    target_sat: u64,
    fee_rate_sat_vbyte: u64,
) -> Result<UtxoSelection, BtcError> {
    if utxos.is_empty() {
        return Err(BtcError::InsufficientFunds {
            have: 0,
            need: target_sat,
        });
    }

    // Sort by value descending (largest first).
    let mut sorted: Vec<&Utxo> = utxos.iter().collect();
    sorted.sort_by(|a, b| {
        b.amount_sat
            .cmp(&a.amount_sat)
            .then_with(|| a.txid.cmp(&b.txid))
            .then_with(|| a.vout.cmp(&b.vout))
    });

    let mut selected: Vec<Utxo> = Vec::new();
    let mut total_sat: u64 = 0;

    for utxo in &sorted {
        selected.push((*utxo).clone());
        total_sat += utxo.amount_sat;

        // Estimate fee with current selection count and 2 outputs (recipient + change).
        let fee = crate::transaction::estimate_fee(selected.len(), 2, fee_rate_sat_vbyte);
        if total_sat >= target_sat + fee {
            return Ok(UtxoSelection { selected, total_sat });
        }
    }

    // Even after selecting all UTXOs, check if we have enough.
    let fee = crate::transaction::estimate_fee(selected.len(), 2, fee_rate_sat_vbyte);
    if total_sat >= target_sat + fee {
        return Ok(UtxoSelection { selected, total_sat });
    }

    Err(BtcError::InsufficientFunds {
        have: total_sat,
        need: target_sat + fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_utxo(txid: &str, vout: u32, amount_sat: u64) -> Utxo {
        Utxo {
            txid: txid.to_string(),
            vout,
            amount_sat,
            script_pubkey: vec![0xaa; 22], // dummy script bytes
        }
    }

    #[test]
    fn selects_single_large_utxo() {
        let utxos = vec![
            make_utxo("aaaa", 0, 100_000),
            make_utxo("bbbb", 0, 50_000),
        ];
        let selection = select_utxos(&utxos, 40_000, 1).unwrap();
        assert_eq!(selection.selected.len(), 1);
        assert_eq!(selection.total_sat, 100_000);
    }

    #[test]
    fn selects_multiple_utxos_when_needed() {
        let utxos = vec![
            make_utxo("aaaa", 0, 30_000),
            make_utxo("bbbb", 0, 30_000),
            make_utxo("cccc", 0, 30_000),
        ];
        let selection = select_utxos(&utxos, 55_000, 1).unwrap();
        assert!(selection.selected.len() >= 2);
        assert!(selection.total_sat >= 55_000);
    }

    #[test]
    fn insufficient_funds_returns_error() {
        let utxos = vec![make_utxo("aaaa", 0, 1_000)];
        let err = select_utxos(&utxos, 500_000, 1).unwrap_err();
        assert!(matches!(err, BtcError::InsufficientFunds { have: 1_000, .. }));
    }

    #[test]
    fn empty_utxos_returns_error() {
        let err = select_utxos(&[], 1_000, 1).unwrap_err();
        assert!(matches!(err, BtcError::InsufficientFunds { have: 0, need: 1_000 }));
    }

    #[test]
    fn largest_first_ordering() {
        let utxos = vec![
            make_utxo("small", 0, 1_000),
            make_utxo("large", 0, 100_000),
            make_utxo("medium", 0, 50_000),
        ];
        let selection = select_utxos(&utxos, 10_000, 1).unwrap();
        // Should pick the largest first, so only one UTXO needed.
        assert_eq!(selection.selected.len(), 1);
        assert_eq!(selection.selected[0].txid, "large");
    }

    #[test]
    fn equal_values_select_deterministically() {
        let utxos = vec![make_utxo("bbbb", 1, 30_000), make_utxo("aaaa", 0, 30_000)];
        let selection = select_utxos(&utxos, 10_000, 1).unwrap();
        assert_eq!(selection.selected[0].txid, "aaaa");
    }

    #[test]
    fn fee_rate_affects_selection() {
        let utxos = vec![
            make_utxo("aaaa", 0, 50_000),
            make_utxo("bbbb", 0, 50_000),
        ];
        // With a very high fee rate, one UTXO may not be enough.
        let result_low = select_utxos(&utxos, 40_000, 1);
        let result_high = select_utxos(&utxos, 40_000, 500);

        assert!(result_low.is_ok());
        // High fee rate may need more UTXOs or may fail.
        if let Ok(sel) = result_high {
            assert!(sel.selected.len() >= result_low.unwrap().selected.len());
        }
    }
}
