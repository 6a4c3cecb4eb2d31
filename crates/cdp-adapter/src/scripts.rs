//! Page-side helpers injected through `Runtime.evaluate` / `Runtime.callFunctionOn`.

/// Defines `window.__refpilot` once per document; every other snippet assumes it exists.
pub const PRELUDE: &str = r#"
(() => {
  if (window.__refpilot) return;
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const implicitRole = (el) => {
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || 'text').toLowerCase();
    switch (tag) {
      case 'a': return el.hasAttribute('href') ? 'link' : 'generic';
      case 'button': case 'summary': return 'button';
      case 'select': return (el.multiple || el.size > 1) ? 'listbox' : 'combobox';
      case 'textarea': return 'textbox';
      case 'option': return 'option';
      case 'img': return 'img';
      case 'h1': case 'h2': case 'h3': case 'h4': case 'h5': case 'h6': return 'heading';
      case 'input':
        if (['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
        if (type === 'checkbox') return 'checkbox';
        if (type === 'radio') return 'radio';
        if (type === 'range') return 'slider';
        if (type === 'number') return 'spinbutton';
        if (type === 'search') return el.hasAttribute('list') ? 'combobox' : 'searchbox';
        if (type === 'hidden') return 'none';
        return el.hasAttribute('list') ? 'combobox' : 'textbox';
      default: return 'generic';
    }
  };
  const role = (el) => {
    const explicit = norm(el.getAttribute('role')).split(' ')[0];
    return explicit || implicitRole(el);
  };
  const name = (el) => {
    const aria = norm(el.getAttribute('aria-label'));
    if (aria) return aria;
    const labelledby = el.getAttribute('aria-labelledby');
    if (labelledby) {
      const text = labelledby.split(/\s+/).map((id) => {
        const ref = document.getElementById(id);
        return ref ? norm(ref.innerText || ref.textContent) : '';
      }).join(' ');
      if (norm(text)) return norm(text);
    }
    if (el.id) {
      const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (label && norm(label.innerText)) return norm(label.innerText);
    }
    const wrapping = el.closest('label');
    if (wrapping && wrapping !== el && norm(wrapping.innerText)) return norm(wrapping.innerText);
    for (const attr of ['placeholder', 'title', 'alt']) {
      const v = norm(el.getAttribute(attr));
      if (v) return v;
    }
    const text = norm(el.innerText || el.textContent);
    if (text) return text;
    return norm(el.value);
  };
  const visible = (el) => {
    const rect = el.getBoundingClientRect();
    const style = getComputedStyle(el);
    return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
  };
  window.__refpilot = { norm, role, name, visible };
})();
"#;

pub const QUERY_BY_ROLE: &str = r#"
((wantRole, wantName, exact) => {
  const rp = window.__refpilot;
  const needle = rp.norm(wantName).toLowerCase();
  return Array.from(document.querySelectorAll('*')).filter((el) => {
    if (rp.role(el) !== wantRole) return false;
    const n = rp.name(el);
    if (!needle) return true;
    return exact ? n === rp.norm(wantName) : n.toLowerCase().includes(needle);
  });
})"#;

pub const QUERY_BY_TEXT: &str = r#"
((text) => {
  const rp = window.__refpilot;
  const needle = rp.norm(text).toLowerCase();
  if (!needle) return [];
  const hits = Array.from(document.body ? document.body.querySelectorAll('*') : []).filter((el) =>
    rp.norm(el.innerText || el.textContent).toLowerCase().includes(needle) && rp.visible(el));
  // Innermost matches only.
  return hits.filter((el) => !hits.some((other) => other !== el && el.contains(other)));
})"#;

pub const FOCUSED_ELEMENT: &str = r#"
(() => {
  const el = document.activeElement;
  if (!el || el === document.body) return null;
  const rp = window.__refpilot;
  return { role: rp.role(el), name: rp.name(el), tag: el.tagName.toLowerCase() };
})()"#;

pub const FILL: &str = r#"
function(value) {
  this.focus();
  if (this.isContentEditable) {
    this.textContent = value;
  } else {
    const proto = this instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
      : this instanceof HTMLSelectElement ? HTMLSelectElement.prototype
      : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value');
    if (setter && setter.set) setter.set.call(this, value); else this.value = value;
  }
  this.dispatchEvent(new Event('input', { bubbles: true }));
  this.dispatchEvent(new Event('change', { bubbles: true }));
}"#;

pub const ELEMENT_STATE: &str = r#"
function() {
  const rp = window.__refpilot;
  const disabled = !!this.disabled || this.getAttribute('aria-disabled') === 'true';
  const checked = !!this.checked || this.getAttribute('aria-checked') === 'true';
  const editable = !disabled && !this.readOnly &&
    (this.isContentEditable || ['INPUT', 'TEXTAREA', 'SELECT'].includes(this.tagName));
  return { visible: rp.visible(this), enabled: !disabled, checked, editable };
}"#;

pub const BOUNDING_BOX: &str = r#"
function() {
  const r = this.getBoundingClientRect();
  return { x: r.x, y: r.y, width: r.width, height: r.height };
}"#;

pub const SELECT_OPTION: &str = r#"
function(wanted) {
  if (this.tagName !== 'SELECT') return null;
  const opt = Array.from(this.options).find((o) => o.value === wanted || o.label.trim() === wanted);
  if (!opt) return null;
  opt.selected = true;
  this.dispatchEvent(new Event('input', { bubbles: true }));
  this.dispatchEvent(new Event('change', { bubbles: true }));
  return Array.from(this.selectedOptions).map((o) => o.value);
}"#;

pub const GET_ATTRIBUTE: &str = "function(name) { return this.getAttribute(name); }";
pub const INNER_TEXT: &str =
    "function() { return window.__refpilot.norm(this.innerText || this.textContent); }";
pub const FOCUS: &str = "function() { this.focus(); }";
pub const SCROLL_INTO_VIEW: &str =
    "function() { this.scrollIntoView({ block: 'center', inline: 'center' }); }";
pub const IS_WITHIN: &str = "function(selector) { return !!this.closest(selector); }";
