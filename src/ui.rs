//! Server-rendered HTML shell.
//!
//! The pages are assembled as plain HTML strings: a shared shell plus
//! per-page content. Configuration reaches the browser through `data-*`
//! attributes on the chat root; the inline script below is presentation
//! only — it submits messages, subscribes to the SSE reveal stream, and
//! wires the feedback controls. All chunking, rendering, and pacing happens
//! server-side.

use crate::config::ChatModel;

/// Values the chat page needs at render time.
#[derive(Debug)]
pub struct ChatPageContext<'a> {
    pub session_id: &'a str,
    pub endpoint: &'a str,
    pub models: &'a [ChatModel],
    pub dictation_ws_url: &'a str,
    pub dev_mode: bool,
}

const APP_CSS: &str = r"
    body { margin: 0; font-family: system-ui, sans-serif; background: #fafafa; color: #18181b; }
    header.site { position: sticky; top: 0; background: #ffffffcc; backdrop-filter: blur(6px); border-bottom: 1px solid #e4e4e7; }
    header.site .inner { max-width: 60rem; margin: 0 auto; display: flex; align-items: center; justify-content: space-between; padding: 0.75rem 1rem; }
    header.site a { color: inherit; text-decoration: none; font-weight: 600; }
    main { max-width: 48rem; margin: 0 auto; padding: 1rem; }
    #chat-log { display: flex; flex-direction: column; gap: 1rem; padding-bottom: 10rem; }
    .msg { display: flex; width: 100%; }
    .msg.user { justify-content: flex-end; }
    .msg .bubble { max-width: 85%; padding: 0.5rem 1rem; border-radius: 1.5rem; overflow-wrap: anywhere; }
    .msg.user .bubble { background: #e4e4e7; }
    .msg.assistant .bubble { background: #ffffff; border: 1px solid #e4e4e7; width: 100%; }
    .msg.error .bubble { background: #fef2f2; border: 1px solid #fecaca; }
    .stream-chunk { opacity: 0; transform: translateY(2px); transition: opacity 120ms ease-out, transform 120ms ease-out; }
    .stream-chunk.visible { opacity: 1; transform: translateY(0); }
    form.composer { position: fixed; bottom: 0; left: 50%; transform: translateX(-50%); width: 100%; max-width: 48rem; background: #fafafa; padding: 0.75rem 1rem 1rem; box-sizing: border-box; }
    form.composer textarea { width: 100%; box-sizing: border-box; min-height: 3rem; padding: 0.75rem 1rem; border: 1px solid #d4d4d8; border-radius: 1rem; font: inherit; resize: none; }
    form.composer .row { display: flex; align-items: center; gap: 0.5rem; margin-top: 0.5rem; }
    form.composer button { padding: 0.5rem 1rem; border: none; border-radius: 0.75rem; background: #18181b; color: #fff; cursor: pointer; }
    .feedback { margin: 0.25rem 0 0 1rem; font-size: 0.875rem; color: #71717a; }
    .feedback button { margin-left: 0.5rem; padding: 0.125rem 0.5rem; border: 1px solid #d4d4d8; border-radius: 0.375rem; background: #fff; cursor: pointer; }
    .feedback .reasons { margin-top: 0.5rem; display: flex; flex-direction: column; gap: 0.25rem; max-width: 20rem; }
    .feedback .reasons button { text-align: left; margin-left: 0; }
    .feedback textarea { width: 100%; max-width: 20rem; margin-top: 0.5rem; font: inherit; }
    .sidebar { font-size: 0.875rem; margin-bottom: 1rem; }
    .sidebar button, .sidebar select { margin-right: 0.5rem; }
    .disclaimer { text-align: center; font-size: 0.7rem; color: #71717a; margin-top: 0.5rem; }
    .overlay { display: flex; flex-direction: column; align-items: center; gap: 1rem; padding: 4rem 1rem; text-align: center; color: #52525b; }
";

/// Generate the HTML shell for the application.
#[must_use]
pub fn html_shell(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="description" content="University chatbot assistant">
    <title>{title} - ChatDKU</title>
    <style>{APP_CSS}</style>
</head>
<body>
    <header class="site">
        <div class="inner">
            <a href="/">ChatDKU</a>
            <nav>
                <a href="/">Chat</a>
                <a href="/about" style="margin-left:1rem">About</a>
            </nav>
        </div>
    </header>
    <main>
        {content}
    </main>
</body>
</html>"#
    )
}

/// Chat page content.
#[must_use]
pub fn chat_content(ctx: &ChatPageContext<'_>) -> String {
    let model_options: String = ctx
        .models
        .iter()
        .map(|m| {
            let selected = if m.endpoint == ctx.endpoint {
                " selected"
            } else {
                ""
            };
            format!(
                r#"<option value="{}"{selected}>{}</option>"#,
                m.endpoint, m.name
            )
        })
        .collect();

    let disclaimer = if ctx.dev_mode {
        "This is an unreleased testing site for development purposes only."
    } else {
        "AI responses may contain errors. Please verify with your advisor and/or Academic Services if anything is unclear."
    };

    format!(
        r#"
    <div id="chat-root"
         data-session-id="{session_id}"
         data-endpoint="{endpoint}"
         data-dictation-ws="{dictation_ws}">
        <div class="sidebar">
            <button id="new-chat" type="button">New chat</button>
            <select id="model-select">{model_options}</select>
            <label>
                Attach
                <input id="file-upload" type="file" style="width:12rem">
            </label>
            <span id="conversations"></span>
        </div>
        <div id="chat-log"></div>
        <form class="composer" id="composer">
            <textarea id="message" name="message" placeholder="Type your message..." required></textarea>
            <div class="row">
                <label><input type="checkbox" id="thinking-mode"> Agent mode</label>
                <input id="search-mode" type="hidden" value="">
                <button type="submit">Send</button>
            </div>
            <p class="disclaimer">{disclaimer}</p>
        </form>
    </div>
    <script>{CHAT_JS}</script>
    "#,
        session_id = ctx.session_id,
        endpoint = ctx.endpoint,
        dictation_ws = ctx.dictation_ws_url,
    )
}

/// Shown when session bootstrap failed; the button retries session creation.
#[must_use]
pub fn session_error_content() -> &'static str {
    r#"
    <div class="overlay">
        <p>We couldn't start a chat session. Please try again.</p>
        <button type="button"
                onclick="fetch('/session/new', {method: 'POST'}).then(function (r) { if (r.ok) location.reload(); })">
            Try again
        </button>
    </div>
    "#
}

/// Landing page with the terms gate.
#[must_use]
pub fn landing_content() -> &'static str {
    r#"
    <div class="overlay">
        <h1>Welcome to ChatDKU</h1>
        <p>
            ChatDKU is an AI assistant for the university community. Responses
            are generated by a language model and may contain errors; do not
            rely on them without verification. Conversations are stored to
            improve the service.
        </p>
        <form method="post" action="/landing/accept">
            <button type="submit">I understand, start chatting</button>
        </form>
    </div>
    "#
}

/// About page content.
#[must_use]
pub fn about_content() -> &'static str {
    r#"
    <div class="overlay">
        <h1>About ChatDKU</h1>
        <p>
            A chat assistant for the university community, answering questions
            with retrieval-augmented generation over campus documents. This
            site is the web frontend; answers come from a separate backend
            service.
        </p>
        <a href="/">Start chatting</a>
    </div>
    "#
}

/// Client-side presentation script for the chat page.
///
/// Subscribes to the server's SSE reveal stream and animates each chunk in;
/// no markdown parsing or pacing happens here.
const CHAT_JS: &str = r#"
(function () {
    var root = document.getElementById('chat-root');
    var log = document.getElementById('chat-log');
    var composer = document.getElementById('composer');
    var messageInput = document.getElementById('message');
    var sessionId = root.dataset.sessionId;

    function bubble(kind) {
        var wrapper = document.createElement('div');
        wrapper.className = 'msg ' + kind;
        var inner = document.createElement('div');
        inner.className = 'bubble';
        wrapper.appendChild(inner);
        log.appendChild(wrapper);
        log.scrollTo(0, log.scrollHeight);
        return inner;
    }

    function addUserMessage(text) {
        bubble('user').textContent = text;
    }

    function addErrorMessage(text) {
        bubble('assistant error').textContent = text;
    }

    function sendFeedback(userInput, botAnswer, reason) {
        fetch('/api/feedback', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({
                userInput: userInput,
                botAnswer: botAnswer,
                feedbackReason: reason,
                chatHistoryId: sessionId
            })
        }).catch(function (err) { console.error('Failed to save feedback:', err); });
    }

    function attachFeedback(container, userInput, botAnswer) {
        var div = document.createElement('div');
        div.className = 'feedback';
        div.innerHTML = 'Was this response helpful?' +
            '<button type="button" data-vote="yes">Yes</button>' +
            '<button type="button" data-vote="no">No</button>';
        container.parentElement.appendChild(div);

        div.querySelector('[data-vote=yes]').addEventListener('click', function () {
            sendFeedback(userInput, botAnswer, 'helpful');
            div.textContent = 'Thanks for your feedback!';
        });

        div.querySelector('[data-vote=no]').addEventListener('click', function () {
            div.innerHTML = 'Sorry to hear that. Can you tell us why?' +
                '<div class="reasons">' +
                '<button type="button" data-reason="not_correct">Not Correct</button>' +
                '<button type="button" data-reason="not_clear">Not Clear</button>' +
                '<button type="button" data-reason="not_relevant">Not Relevant</button>' +
                '<button type="button" data-reason="other">Other</button>' +
                '</div>' +
                '<textarea rows="3" placeholder="Please describe the issue" style="display:none"></textarea>';
            var custom = div.querySelector('textarea');
            div.querySelectorAll('[data-reason]').forEach(function (btn) {
                btn.addEventListener('click', function () {
                    var reason = btn.dataset.reason;
                    if (reason === 'other') {
                        custom.style.display = 'block';
                        custom.focus();
                        custom.addEventListener('change', function () {
                            if (custom.value.trim()) {
                                sendFeedback(userInput, botAnswer, custom.value.trim());
                                div.textContent = 'Thanks for your feedback!';
                            }
                        });
                    } else {
                        sendFeedback(userInput, botAnswer, reason);
                        div.textContent = 'Thanks for your feedback!';
                    }
                });
            });
        });
    }

    function streamInto(container, streamUrl, userInput) {
        var source = new EventSource(streamUrl);
        var chunks = [];
        source.addEventListener('message', function (event) {
            var chunk = document.createElement('div');
            chunk.className = 'stream-chunk';
            chunk.innerHTML = event.data;
            container.appendChild(chunk);
            chunks.push(chunk.textContent);
            requestAnimationFrame(function () { chunk.classList.add('visible'); });
            log.scrollTo(0, log.scrollHeight);
        });
        source.addEventListener('done', function () {
            source.close();
            attachFeedback(container, userInput, chunks.join('\n'));
        });
        source.addEventListener('error', function () { source.close(); });
    }

    composer.addEventListener('submit', function (event) {
        event.preventDefault();
        var value = messageInput.value.trim();
        if (!value) { return; }
        messageInput.value = '';
        addUserMessage(value);

        fetch('/chat/send', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({
                message: value,
                thinking: document.getElementById('thinking-mode').checked,
                search_mode: document.getElementById('search-mode').value
            })
        }).then(function (response) {
            if (!response.ok) {
                return response.json().then(function (body) {
                    addErrorMessage(body.error || 'Error: request failed');
                });
            }
            return response.json().then(function (body) {
                sessionId = body.session_id;
                streamInto(bubble('assistant'), body.stream_url, value);
            });
        }).catch(function (err) {
            addErrorMessage('Error: ' + (err && err.message ? err.message : 'An unknown error occurred'));
        });
    });

    messageInput.addEventListener('keydown', function (event) {
        if (event.key === 'Enter' && !event.shiftKey) {
            event.preventDefault();
            composer.requestSubmit();
        }
    });

    document.getElementById('new-chat').addEventListener('click', function () {
        fetch('/session/new', { method: 'POST' }).then(function (response) {
            if (!response.ok) {
                addErrorMessage("We couldn't start a new chat session. Please try again.");
                return;
            }
            response.json().then(function (body) {
                sessionId = body.session_id;
                log.innerHTML = '';
            });
        });
    });

    document.getElementById('model-select').addEventListener('change', function (event) {
        fetch('/api/endpoint', {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify({ endpoint: event.target.value })
        });
    });

    document.getElementById('file-upload').addEventListener('change', function (event) {
        var file = event.target.files[0];
        if (!file) { return; }
        var form = new FormData();
        form.append('file', file);
        fetch('/api/upload', { method: 'POST', body: form }).then(function (response) {
            if (!response.ok) { addErrorMessage('Error: file upload failed'); }
        });
    });

    fetch('/api/conversations').then(function (response) {
        return response.ok ? response.json() : [];
    }).then(function (convos) {
        var holder = document.getElementById('conversations');
        convos.forEach(function (convo) {
            var btn = document.createElement('button');
            btn.type = 'button';
            btn.textContent = convo.title;
            btn.addEventListener('click', function () {
                fetch('/api/sessions/' + convo.id + '/messages').then(function (r) {
                    return r.ok ? r.json() : [];
                }).then(function (messages) {
                    log.innerHTML = '';
                    sessionId = convo.id;
                    messages.forEach(function (msg) {
                        bubble(msg.role).innerHTML = msg.html;
                    });
                });
            });
            holder.appendChild(btn);
        });
    });
})();
"#;
