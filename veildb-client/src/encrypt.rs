//! The per-item encryption pipeline.
//!
//! On write: derive the material name from the primary key, obtain fresh
//! encryption materials, then walk the attributes applying each one's
//! action. Primary-key attributes are always copied verbatim and never
//! renamed. Encrypted attributes become binary blobs; the associated
//! data for every attribute is the attribute name as raw bytes, which
//! binds each ciphertext to its slot.
//!
//! On read the walk is symmetric, with two pass-through rules for
//! gradual adoption: a non-binary value under an encrypting action is
//! returned as-is, and materials are only fetched once the first
//! actually-encrypted attribute is hit (so items written before
//! encryption was enabled still read cleanly).

use crate::action::{Action, AttributeActions};
use crate::error::{ClientError, Result};
use tracing::trace;
use veildb_core::{codec, material_name, AttrValue, Item, KeySchema};
use veildb_materials::{CryptographicMaterials, DecryptionMaterials, MaterialsProvider};

/// Encrypt an item's attributes, excluding primary keys.
pub(crate) async fn encrypt_item(
    provider: &dyn MaterialsProvider,
    actions: &AttributeActions,
    schema: &KeySchema,
    item: &Item,
) -> Result<Item> {
    let name = material_name(schema, item)?;
    let materials = provider.encryption_materials(&name).await?;
    let key = materials.encryption_key()?;

    let mut encrypted = Item::with_capacity(item.len());
    for (attribute, value) in item {
        if schema.is_key_attribute(attribute) {
            encrypted.insert(attribute.clone(), value.clone());
            continue;
        }

        match actions.action_for(attribute) {
            Action::DoNothing => {
                encrypted.insert(attribute.clone(), value.clone());
            }
            Action::EncryptRandomized => {
                let plaintext = codec::encode(value)
                    .map_err(|e| ClientError::attribute_codec(attribute, e))?;
                let ciphertext = key
                    .encrypt(&plaintext, attribute.as_bytes())
                    .map_err(|e| ClientError::attribute_encrypt(attribute, e))?;
                encrypted.insert(attribute.clone(), AttrValue::B(ciphertext));
            }
            Action::EncryptDeterministic => {
                let plaintext = codec::encode(value)
                    .map_err(|e| ClientError::attribute_codec(attribute, e))?;
                let ciphertext = key
                    .encrypt_deterministic(&plaintext, attribute.as_bytes())
                    .map_err(|e| ClientError::attribute_encrypt(attribute, e))?;
                encrypted.insert(attribute.clone(), AttrValue::B(ciphertext));
            }
        }
    }

    trace!(material_name = %name, attributes = item.len(), "encrypted item");
    Ok(encrypted)
}

/// Decrypt an item's attributes, excluding primary keys.
///
/// Decryption materials are fetched lazily, on the first encrypted
/// attribute; an item with none stays untouched and costs no material
/// lookup.
pub(crate) async fn decrypt_item(
    provider: &dyn MaterialsProvider,
    actions: &AttributeActions,
    schema: &KeySchema,
    item: &Item,
) -> Result<Item> {
    let mut materials: Option<DecryptionMaterials> = None;

    let mut decrypted = Item::with_capacity(item.len());
    for (attribute, value) in item {
        if schema.is_key_attribute(attribute) {
            decrypted.insert(attribute.clone(), value.clone());
            continue;
        }

        let action = actions.action_for(attribute);
        if action == Action::DoNothing {
            decrypted.insert(attribute.clone(), value.clone());
            continue;
        }

        // Declared encrypted but not stored as binary: pass through.
        let AttrValue::B(ciphertext) = value else {
            decrypted.insert(attribute.clone(), value.clone());
            continue;
        };

        if materials.is_none() {
            let name = material_name(schema, item)?;
            materials = Some(provider.decryption_materials(&name, 0).await?);
        }
        let key = materials
            .as_ref()
            .expect("filled above")
            .decryption_key()?;

        let plaintext = if action == Action::EncryptDeterministic {
            key.decrypt_deterministic(ciphertext, attribute.as_bytes())
        } else {
            key.decrypt(ciphertext, attribute.as_bytes())
        }
        .map_err(|e| ClientError::attribute_decrypt(attribute, e))?;

        let value = codec::decode(&plaintext)
            .map_err(|e| ClientError::attribute_codec(attribute, e))?;
        decrypted.insert(attribute.clone(), value);
    }

    Ok(decrypted)
}
