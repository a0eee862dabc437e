//! Static texts: the one-time welcome notice sent to new bridge users.

use crate::common::types::Platform;

/// Embed title of the Discord welcome notice.
pub const NOTICE_TITLE: &str = "📡 Stoat ↔ Discord Bridge";

/// Embed footer of the Discord welcome notice.
pub const NOTICE_FOOTER: &str = "This message was sent once because you wrote in a bridged channel.";

/// Embed colour of the Discord welcome notice (#FF6B35).
pub const NOTICE_COLOUR: u32 = 0xFF6B35;

const NOTICE_BODY: &str = "\
**What happens to your messages?**
• Your **display name** and **profile picture** are shown on the other platform.
• The **content** of your messages (text and attachments) is transferred to the other platform.
• Attachments are briefly buffered in the bot's memory for forwarding and discarded immediately afterwards.
• **No** messages are stored permanently on the bot's server.

**Deletion:**
If you delete a message, it will automatically be deleted on the other platform as well.

If you don't want to use the bridge / your messages to be transferred, simply stop writing in the bridged channel - \
your messages will not be forwarded.
";

/// Welcome notice text for a user who wrote on `platform`.
pub fn welcome_notice(platform: Platform) -> String {
    let (here, there, link) = match platform {
        Platform::Discord => ("Discord", "Stoat", "https://stoat.chat"),
        Platform::Stoat => ("Stoat", "Discord", "https://discord.gg"),
    };
    format!(
        "👋 **Hey! You just used the Stoat↔Discord Bridge Bot.**\n\n\
         This bot connects a {} channel to a channel on **{}** ({}), \
         forwarding messages between both platforms in real time.\n\n{}",
        here, there, link, NOTICE_BODY
    )
}
