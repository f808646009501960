pub mod cart;
pub mod config;
pub mod dialogue;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod replies;
pub mod routing;

pub use cart::{CartEngine, CheckoutOutcome, ProposedItem};
pub use dialogue::{DialogueMachine, DialogueState};
pub use domain::cart::{Addition, Cart, CartLine, CartSnapshot};
pub use domain::menu::{Menu, MenuItem, MenuItemId};
pub use domain::message::{InboundMessage, OutboundReply, ReplyIntent};
pub use domain::order::{OrderId, OrderProjection};
pub use domain::session::{Message, MessageRole, Session, SessionKey, SessionUpdate, UserId};
pub use domain::tenant::{AssistantMode, TenantConfig, TenantId};
pub use errors::{ConversationError, InterfaceError, LookupError, ValidationError};
pub use ports::{MenuProvider, OrderSink, PortError, SessionStore, SessionStoreError};
pub use routing::{FastIntent, IntentRouter, Route, RouteDecision};
