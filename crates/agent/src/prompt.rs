//! Prompt assembly. The system prompt carries the exact cart and menu so the
//! model never has to remember either.

use serde::Serialize;
use tera::{Context, Tera};

use ordermate_core::dialogue::{context_hint, DialogueState};
use ordermate_core::domain::menu::Menu;
use ordermate_core::domain::session::{MessageRole, Session};
use ordermate_core::domain::tenant::TenantConfig;

use crate::llm::{ChatMessage, CompletionRequest, DraftFields};

pub const DEFAULT_HISTORY_WINDOW: usize = 10;

const SYSTEM_TEMPLATE: &str = "system.txt";
const STATE_TEMPLATE: &str = "state.txt";
const JUDGE_TEMPLATE: &str = "judge.txt";

const SYSTEM_PROMPT: &str = r#"You are the ordering assistant for "{{ restaurant }}". You take food orders conversationally, like a friendly waiter.

CART (exact, authoritative):
{% if cart_lines | length == 0 %}- The cart is empty.
{% else %}{% for line in cart_lines %}- {{ line }}
{% endfor %}{% endif %}Cart total: {{ cart_total }}
When the customer asks about the cart or total, report exactly these items and this total.

MENU (the only things you may offer):
{% for item in menu %}- {{ item.title }} - {{ item.price }}{% if item.tags | length > 0 %} ({% for tag in item.tags %}{{ tag }}{% if not loop.last %}, {% endif %}{% endfor %}){% endif %}
{% endfor %}Categories served: {% if categories | length == 0 %}none listed{% else %}{% for category in categories %}{{ category }}{% if not loop.last %}, {% endif %}{% endfor %}{% endif %}

RULES:
1. Never suggest or mention items or categories that are not on the menu above. If asked for something we do not serve, say so politely.
2. Never add items again that are already in the cart unless the customer asks for more of them in this message.
3. Never say the cart is empty when it has items. Never invent quantities or prices.
4. Put in orderItems only the items the customer asked for in this message, using exact menu titles.
5. When you ask whether to proceed to checkout and the customer agrees, use intent "confirm" and leave orderItems empty.
6. When you recommend an item, recommend one item from the menu by its exact title.
7. Greet only once per conversation. Keep replies warm and short.
{% if focus %}
{{ focus }}
{% endif %}
Reply with a single JSON object and nothing else:
{"reply_text": "<your reply to the customer>", "intent": "<info|add_to_cart|upsell|confirm|unknown>", "orderItems": [{"title": "<exact menu title>", "qty": 1}], "totalEstimate": 0}
"#;

const STATE_PROMPT: &str = r#"CONVERSATION STATE: {{ state }}
{% if hint %}{{ hint }}
{% endif %}{% if checkout %}The customer is confirming checkout. Do not add items again; use intent "confirm".
{% endif %}"#;

const JUDGE_PROMPT: &str = r#"You are a strict quality evaluator for a restaurant ordering assistant.

Customer message: {{ user_text }}
Previous assistant message: {{ previous_assistant }}
Current cart: {% if cart_lines | length == 0 %}empty{% else %}{% for line in cart_lines %}{{ line }}{% if not loop.last %}, {% endif %}{% endfor %}{% endif %}
Menu: {% for item in menu %}{{ item.title }} ({{ item.price }}){% if not loop.last %}; {% endif %}{% endfor %}
Conversation state: {{ state }}

Reply to evaluate:
{{ reply_text }}
Declared intent: {{ intent }}

Fail the reply if it mentions items or categories not on the menu, does not address the customer, says the cart is empty while it has items, contains JSON or evaluation text, adds items while the customer is confirming checkout, or adds the same item twice.

Answer with JSON only: {"PASS": true|false, "FEEDBACK": "<why it failed>", "SUGGESTION": "<a corrected reply, or empty>"}
"#;

#[derive(Serialize)]
struct MenuLine {
    title: String,
    price: String,
    tags: Vec<String>,
}

pub struct PromptInput<'a> {
    pub tenant: &'a TenantConfig,
    pub menu: &'a Menu,
    pub session: &'a Session,
    pub user_text: &'a str,
    pub state: DialogueState,
    pub focus: Option<String>,
}

pub struct PromptBuilder {
    tera: Tera,
    history_window: usize,
}

impl PromptBuilder {
    pub fn new(history_window: usize) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (SYSTEM_TEMPLATE, SYSTEM_PROMPT),
            (STATE_TEMPLATE, STATE_PROMPT),
            (JUDGE_TEMPLATE, JUDGE_PROMPT),
        ])?;
        Ok(Self { tera, history_window })
    }

    /// System prompt, recent history, the current message, the advisory
    /// state, then any feedback from failed attempts.
    pub fn completion(
        &self,
        input: &PromptInput<'_>,
        feedback: &[String],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<CompletionRequest, tera::Error> {
        let mut messages = vec![ChatMessage::system(self.system_prompt(input)?)];

        let skip = input.session.history.len().saturating_sub(self.history_window);
        messages.extend(input.session.history.iter().skip(skip).map(|message| match message.role {
            MessageRole::User => ChatMessage::user(message.content.clone()),
            MessageRole::Assistant => ChatMessage::assistant(message.content.clone()),
        }));
        messages.push(ChatMessage::user(input.user_text));

        let mut state = Context::new();
        state.insert("state", input.state.as_str());
        state.insert("hint", context_hint(input.state));
        state.insert("checkout", &(input.state == DialogueState::CheckoutConfirmation));
        messages.push(ChatMessage::system(self.tera.render(STATE_TEMPLATE, &state)?.trim()));

        for item in feedback {
            messages.push(ChatMessage::system(format!(
                "IMPROVEMENT NEEDED: {item}\n\nPlease fix these issues in your next response."
            )));
        }

        Ok(CompletionRequest { messages, temperature, max_tokens })
    }

    pub fn system_prompt(&self, input: &PromptInput<'_>) -> Result<String, tera::Error> {
        let mut context = self.shared_context(input.tenant, input.menu, input.session);
        context.insert("restaurant", &input.tenant.display_name);
        context.insert("categories", &input.menu.categories());
        context.insert("focus", &input.focus);
        self.tera.render(SYSTEM_TEMPLATE, &context)
    }

    pub fn judge_prompt(
        &self,
        input: &PromptInput<'_>,
        draft: &DraftFields,
    ) -> Result<String, tera::Error> {
        let mut context = self.shared_context(input.tenant, input.menu, input.session);
        context.insert("user_text", input.user_text);
        context.insert(
            "previous_assistant",
            &input
                .session
                .previous_assistant_message()
                .map(|message| message.content.as_str())
                .unwrap_or("(none)"),
        );
        context.insert("state", input.state.as_str());
        context.insert("reply_text", &draft.reply_text);
        context.insert("intent", &draft.intent);
        self.tera.render(JUDGE_TEMPLATE, &context)
    }

    fn shared_context(&self, tenant: &TenantConfig, menu: &Menu, session: &Session) -> Context {
        let cart_lines = session
            .cart
            .lines
            .iter()
            .map(|line| {
                format!(
                    "{} x {} ({} each)",
                    line.qty,
                    line.title,
                    tenant.format_amount(line.unit_price)
                )
            })
            .collect::<Vec<_>>();
        let menu_lines = menu
            .items
            .iter()
            .map(|item| MenuLine {
                title: item.title.clone(),
                price: tenant.format_amount(item.price),
                tags: item.tags.clone(),
            })
            .collect::<Vec<_>>();

        let mut context = Context::new();
        context.insert("cart_lines", &cart_lines);
        context.insert("cart_total", &tenant.format_amount(session.cart.total()));
        context.insert("menu", &menu_lines);
        context
    }
}
