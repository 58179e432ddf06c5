// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table du backend hébergé, accédée via
//   son API REST. Le schéma est fixe: ces tables ne nous appartiennent pas.
//
// Liste des modules:
//   - identity : Compte émis par le fournisseur d'auth (id opaque + email)
//   - profile : Profils étudiants/enseignants (deux tables, une par rôle)
//   - consultation : Demandes de consultation (statut fini + créneaux)
//   - message : Messages entre étudiants et enseignants
//   - notification : Notifications par utilisateur (produites côté backend)
//   - classroom : Classes et adhésions par code d'invitation
//   - document : Métadonnées des fichiers déposés dans le storage
//   - dto : Data Transfer Objects (pagination, payloads d'écriture validés)
//
// Points d'attention:
//   - Les lignes sont désérialisées telles que le backend les renvoie
//   - Les insertions passent par des payloads dédiés (jamais les entités)
//
// ============================================================================

pub mod classroom;
pub mod consultation;
pub mod document;
pub mod dto;
pub mod identity;
pub mod message;
pub mod notification;
pub mod profile;
