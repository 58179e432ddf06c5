// Services applicatifs: chaque opération valide ses paramètres, émet une
// requête filtrée vers le backend et remonte une erreur uniforme. Jamais
// de panique au-delà de la frontière d'un service.

pub mod auth_service;
pub mod browser;
pub mod classroom_service;
pub mod consultation_service;
pub mod dashboard_service;
pub mod document_service;
pub mod message_service;
pub mod notification_service;
pub mod profile_service;
