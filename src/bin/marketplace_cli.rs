use std::{str::FromStr, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use marketplace_orders::{
    api::{HttpApi, MarketplaceApi},
    config::{self, AppConfig},
    errors::ServiceError,
    events::{self, Event, EventSender, ToastLevel},
    metrics,
    models::{
        CouponType, Order, OrderAcceptanceState, OrderStatus, PaymentMethod, Product,
        ReturnRequestType, VendorOffer,
    },
    queries::{
        summarize, MyOrdersQuery, OrderFilter, OrderSort, OrderSummary, Query,
        ReturnRequestsQuery,
    },
    services::{
        coupons::OfferDraft, orders::Checkout, Actor, CouponService, OrderService,
    },
    state::{CartItem, ClientState, Credentials, LocalStore, NewAddress},
    views::{
        AdminCouponsView, AdminOrdersView, CustomerOrdersView, VendorOffersView,
        VendorOrdersView, ViewContext,
    },
};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut context = CliContext::initialize().await?;

    let outcome = match cli.command {
        Commands::Auth(command) => handle_auth_command(&mut context, command, cli.json).await,
        Commands::Orders(command) => handle_orders_command(&mut context, command, cli.json).await,
        Commands::Returns(command) => handle_returns_command(&mut context, command, cli.json).await,
        Commands::Coupons(command) => handle_coupons_command(&mut context, command, cli.json).await,
        Commands::Cart(command) => handle_cart_command(&mut context, command, cli.json).await,
        Commands::Addresses(command) => {
            handle_addresses_command(&mut context, command, cli.json).await
        }
        Commands::Products(command) => handle_products_command(&context, command, cli.json).await,
    };

    context.flush_events();
    if cli.metrics {
        print!("{}", metrics::gather_text());
    }
    outcome
}

#[derive(Parser)]
#[command(
    name = "marketplace",
    about = "Marketplace CLI for orders, returns and coupon governance",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Dump workflow counters in Prometheus text format after the command"
    )]
    metrics: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Auth(AuthCommands),
    #[command(subcommand)]
    Orders(OrdersCommands),
    #[command(subcommand)]
    Returns(ReturnsCommands),
    #[command(subcommand)]
    Coupons(CouponsCommands),
    #[command(subcommand)]
    Cart(CartCommands),
    #[command(subcommand)]
    Addresses(AddressesCommands),
    #[command(subcommand)]
    Products(ProductsCommands),
}

#[derive(Subcommand)]
enum AuthCommands {
    Login(AuthLoginArgs),
    Whoami,
    Logout,
}

#[derive(Args)]
struct AuthLoginArgs {
    #[arg(long, help = "Email address for the account")]
    email: String,
    #[arg(long, help = "Password for the account")]
    password: String,
}

#[derive(Subcommand)]
enum OrdersCommands {
    /// Orders visible to the signed-in user (own orders, vendor slice or all for admins)
    List(ListOrdersArgs),
    Show(OrderIdArgs),
    /// Admin acceptance (`isPaid`)
    Accept(OrderIdArgs),
    Deliver(OrderIdArgs),
    /// Ask for an order to be cancelled
    Cancel(CancelOrderArgs),
    /// Admin counters over all orders
    Stats,
}

#[derive(Args)]
struct OrderIdArgs {
    #[arg(help = "Order identifier")]
    id: String,
}

#[derive(Args)]
struct CancelOrderArgs {
    #[arg(help = "Order identifier")]
    id: String,
    #[arg(long, help = "Why the order should be cancelled")]
    reason: String,
    #[arg(long, default_value = "", help = "Optional details")]
    description: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderSortArg {
    Newest,
    Oldest,
    Total,
}

impl From<OrderSortArg> for OrderSort {
    fn from(value: OrderSortArg) -> Self {
        match value {
            OrderSortArg::Newest => OrderSort::NewestFirst,
            OrderSortArg::Oldest => OrderSort::OldestFirst,
            OrderSortArg::Total => OrderSort::TotalDesc,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AcceptanceArg {
    Pending,
    Accepted,
    Delivered,
}

impl From<AcceptanceArg> for OrderAcceptanceState {
    fn from(value: AcceptanceArg) -> Self {
        match value {
            AcceptanceArg::Pending => OrderAcceptanceState::Pending,
            AcceptanceArg::Accepted => OrderAcceptanceState::Accepted,
            AcceptanceArg::Delivered => OrderAcceptanceState::Delivered,
        }
    }
}

#[derive(Args)]
struct ListOrdersArgs {
    #[arg(long, value_enum, default_value_t = OrderSortArg::Newest)]
    sort: OrderSortArg,
    #[arg(long, value_parser = parse_order_status, help = "Filter by status label (admin)")]
    status: Option<OrderStatus>,
    #[arg(long, value_enum, help = "Filter by acceptance state (admin)")]
    acceptance: Option<AcceptanceArg>,
    #[arg(long, help = "Search order id, item names and city (admin)")]
    search: Option<String>,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Only orders with an item-level request (admin)"
    )]
    with_requests: bool,
}

#[derive(Subcommand)]
enum ReturnsCommands {
    /// Open a return or exchange request for one delivered item
    Request(ReturnRequestArgs),
    /// Confirm the item was handed back to the courier
    Handover(ItemArgs),
    /// Item-level requests across all orders (admin)
    List(ListReturnsArgs),
}

#[derive(Args)]
struct ItemArgs {
    #[arg(long, help = "Order identifier")]
    order: String,
    #[arg(long, help = "Line item identifier")]
    item: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum RequestKindArg {
    Return,
    Exchange,
    Cancel,
}

impl From<RequestKindArg> for ReturnRequestType {
    fn from(value: RequestKindArg) -> Self {
        match value {
            RequestKindArg::Return => ReturnRequestType::Return,
            RequestKindArg::Exchange => ReturnRequestType::Exchange,
            RequestKindArg::Cancel => ReturnRequestType::Cancel,
        }
    }
}

#[derive(Args)]
struct ReturnRequestArgs {
    #[command(flatten)]
    target: ItemArgs,
    #[arg(long, value_enum)]
    kind: RequestKindArg,
    #[arg(long, help = "Reason for the request")]
    reason: String,
    #[arg(long, default_value = "", help = "Extra comments appended to the reason")]
    comments: String,
}

#[derive(Args)]
struct ListReturnsArgs {
    #[arg(long, action = ArgAction::SetTrue, help = "Hide resolved requests")]
    open: bool,
}

#[derive(Subcommand)]
enum CouponsCommands {
    /// Offers for the signed-in role (all for admins, own for vendors)
    List,
    Create(CreateOfferArgs),
    Approve(OfferIdArgs),
    Reject(RejectOfferArgs),
    Toggle(OfferIdArgs),
    /// Set the percentage ceiling for new offers
    MaxDiscount(MaxDiscountArgs),
    /// Live offers that would discount the current cart
    Applicable,
}

#[derive(Clone, Copy, ValueEnum)]
enum CouponTypeArg {
    Percentage,
    Flat,
}

impl From<CouponTypeArg> for CouponType {
    fn from(value: CouponTypeArg) -> Self {
        match value {
            CouponTypeArg::Percentage => CouponType::Percentage,
            CouponTypeArg::Flat => CouponType::Flat,
        }
    }
}

#[derive(Args)]
struct CreateOfferArgs {
    #[arg(long, help = "Coupon code (normalized to upper case)")]
    code: String,
    #[arg(long = "type", value_enum)]
    kind: CouponTypeArg,
    #[arg(long, value_parser = parse_decimal)]
    value: Decimal,
    #[arg(long, value_parser = parse_decimal)]
    min_order: Option<Decimal>,
    #[arg(long, value_parser = parse_date, help = "First valid day (YYYY-MM-DD)")]
    valid_from: NaiveDate,
    #[arg(long, value_parser = parse_date, help = "Last valid day (YYYY-MM-DD)")]
    valid_until: NaiveDate,
    #[arg(long)]
    description: Option<String>,
}

#[derive(Args)]
struct OfferIdArgs {
    #[arg(help = "Offer identifier")]
    id: String,
}

#[derive(Args)]
struct RejectOfferArgs {
    #[arg(help = "Offer identifier")]
    id: String,
    #[arg(long, default_value = "", help = "Shown to the vendor")]
    reason: String,
}

#[derive(Args)]
struct MaxDiscountArgs {
    #[arg(value_parser = parse_decimal, help = "Percentage in (0, 100]")]
    value: Decimal,
}

#[derive(Subcommand)]
enum CartCommands {
    List,
    Add(CartAddArgs),
    Remove(CartProductArgs),
    Clear,
    /// Place an order for the whole cart
    Checkout(CheckoutArgs),
}

#[derive(Args)]
struct CartAddArgs {
    #[arg(help = "Product identifier")]
    product: String,
    #[arg(long, default_value_t = 1)]
    qty: u32,
}

#[derive(Args)]
struct CartProductArgs {
    #[arg(help = "Product identifier")]
    product: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum PaymentArg {
    Card,
    Upi,
    Cod,
}

impl From<PaymentArg> for PaymentMethod {
    fn from(value: PaymentArg) -> Self {
        match value {
            PaymentArg::Card => PaymentMethod::Card,
            PaymentArg::Upi => PaymentMethod::Upi,
            PaymentArg::Cod => PaymentMethod::Cod,
        }
    }
}

#[derive(Args)]
struct CheckoutArgs {
    #[arg(long, value_enum, default_value_t = PaymentArg::Cod)]
    payment: PaymentArg,
    #[arg(long, help = "Saved address id; defaults to the default address")]
    address: Option<String>,
    #[arg(long, help = "Coupon code to apply")]
    coupon: Option<String>,
}

#[derive(Subcommand)]
enum AddressesCommands {
    List,
    Add(AddAddressArgs),
    Delete(AddressIdArgs),
}

#[derive(Args)]
struct AddAddressArgs {
    #[arg(long)]
    address: String,
    #[arg(long)]
    city: String,
    #[arg(long)]
    pincode: String,
    #[arg(long)]
    phone: String,
    #[arg(long, default_value = "India")]
    country: String,
    #[arg(long, action = ArgAction::SetTrue)]
    default: bool,
}

#[derive(Args)]
struct AddressIdArgs {
    #[arg(help = "Address identifier")]
    id: String,
}

#[derive(Subcommand)]
enum ProductsCommands {
    List,
    Show(ProductIdArgs),
}

#[derive(Args)]
struct ProductIdArgs {
    #[arg(help = "Product identifier")]
    id: String,
}

struct CliContext {
    config: AppConfig,
    api: Arc<dyn MarketplaceApi>,
    event_sender: EventSender,
    event_rx: mpsc::Receiver<Event>,
    state: ClientState,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let api: Arc<dyn MarketplaceApi> =
            Arc::new(HttpApi::from_config(&config).context("failed to build API client")?);
        let store = LocalStore::in_dir(config.storage_path());
        let state = ClientState::load(store).context("failed to read local state")?;
        state.auth.restore(api.as_ref());

        let (event_sender, event_rx) = EventSender::channel(256);

        Ok(Self {
            config,
            api,
            event_sender,
            event_rx,
            state,
        })
    }

    fn api(&self) -> Arc<dyn MarketplaceApi> {
        self.api.clone()
    }

    fn actor(&self) -> Result<Actor> {
        Ok(self.state.auth.require()?.actor())
    }

    fn view_context(&self) -> ViewContext {
        ViewContext::new(self.api(), self.event_sender.clone())
    }

    fn order_service(&self) -> OrderService {
        OrderService::new(self.api(), self.event_sender.clone(), self.config.pricing())
    }

    fn coupon_service(&self) -> CouponService {
        CouponService::new(self.api(), self.event_sender.clone())
    }

    /// Prints queued toasts to stderr and logs the remaining events.
    fn flush_events(&mut self) {
        for event in events::drain(&mut self.event_rx) {
            match event.as_toast() {
                Some(toast) => {
                    let prefix = match toast.level {
                        ToastLevel::Success => "ok",
                        ToastLevel::Info => "info",
                        ToastLevel::Warning => "warning",
                        ToastLevel::Error => "error",
                    };
                    eprintln!("[{prefix}] {}", toast.message);
                }
                None => debug!(target: "marketplace_cli", event = ?event, "domain event"),
            }
        }
    }
}

async fn handle_auth_command(
    context: &mut CliContext,
    command: AuthCommands,
    json: bool,
) -> Result<()> {
    match command {
        AuthCommands::Login(args) => {
            let api = context.api.clone();
            let credentials = Credentials {
                email: args.email,
                password: args.password,
            };
            let session = context
                .state
                .auth
                .login(api.as_ref(), credentials)
                .await
                .context("failed to log in")?
                .clone();
            context
                .state
                .hydrate_from_profile(api.as_ref())
                .await
                .context("failed to sync cart with profile")?;
            if json {
                print_json(&session.user)?;
            } else {
                println!(
                    "Logged in as {} ({}, {})",
                    session.user.name, session.user.email, session.user.role
                );
            }
            Ok(())
        }
        AuthCommands::Whoami => {
            let session = context.state.auth.require()?;
            if json {
                print_json(session)?;
            } else {
                println!(
                    "{} <{}> • role {} • since {}",
                    session.user.name, session.user.email, session.user.role, session.saved_at
                );
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let api = context.api.clone();
            context.state.auth.logout(api.as_ref())?;
            println!("Logged out");
            Ok(())
        }
    }
}

async fn handle_orders_command(
    context: &mut CliContext,
    command: OrdersCommands,
    json: bool,
) -> Result<()> {
    let actor = context.actor()?;
    match command {
        OrdersCommands::List(args) => match actor {
            Actor::Admin => {
                let mut view = AdminOrdersView::new(
                    context.view_context(),
                    context.order_service(),
                    Actor::Admin,
                );
                view.set_filter(
                    OrderFilter {
                        status: args.status,
                        acceptance: args.acceptance.map(Into::into),
                        with_open_requests: args.with_requests,
                        search: args.search,
                        ..Default::default()
                    },
                    args.sort.into(),
                );
                view.refresh().await.context("failed to fetch orders")?;
                render_summaries(&view.summaries(), json)
            }
            Actor::Vendor { vendor_id } => {
                let mut view = VendorOrdersView::new(
                    context.view_context(),
                    context.order_service(),
                    vendor_id,
                );
                view.refresh().await.context("failed to fetch orders")?;
                let slices: Vec<_> = view.slices().collect();
                if json {
                    return print_json(&slices);
                }
                for slice in slices {
                    println!(
                        "- Order {} • {} • {} item(s) • subtotal {} • ship to {}",
                        slice.order_id,
                        slice.badge,
                        slice.items.len(),
                        slice.vendor_subtotal,
                        slice.ship_to
                    );
                }
                Ok(())
            }
            Actor::Customer { .. } => {
                let query = MyOrdersQuery {
                    sort: args.sort.into(),
                };
                let orders = query
                    .execute(context.api.as_ref())
                    .await
                    .context("failed to fetch orders")?;
                let summaries: Vec<OrderSummary> = orders.iter().map(summarize).collect();
                render_summaries(&summaries, json)
            }
        },
        OrdersCommands::Show(args) => {
            let order = fetch_order(context, &actor, &args.id).await?;
            if json {
                print_json(&order)?;
            } else {
                render_order(&order);
            }
            Ok(())
        }
        OrdersCommands::Accept(args) => {
            let accepted = match actor {
                Actor::Admin => {
                    let mut view = AdminOrdersView::new(
                        context.view_context(),
                        context.order_service(),
                        Actor::Admin,
                    );
                    view.refresh().await.context("failed to fetch orders")?;
                    view.accept(&args.id).await
                }
                _ => Err(ServiceError::Forbidden(
                    "Only admins can accept orders".to_string(),
                )),
            };
            accepted.with_context(|| format!("failed to accept order {}", args.id))?;
            println!("Order {} accepted", args.id);
            Ok(())
        }
        OrdersCommands::Deliver(args) => {
            let delivered = match actor {
                Actor::Admin => {
                    let mut view = AdminOrdersView::new(
                        context.view_context(),
                        context.order_service(),
                        Actor::Admin,
                    );
                    view.refresh().await.context("failed to fetch orders")?;
                    view.deliver(&args.id).await
                }
                Actor::Vendor { vendor_id } => {
                    let mut view = VendorOrdersView::new(
                        context.view_context(),
                        context.order_service(),
                        vendor_id,
                    );
                    view.refresh().await.context("failed to fetch orders")?;
                    view.deliver(&args.id).await
                }
                Actor::Customer { .. } => Err(ServiceError::Forbidden(
                    "Only admins and vendors can mark orders delivered".to_string(),
                )),
            };
            delivered.with_context(|| format!("failed to deliver order {}", args.id))?;
            println!("Order {} marked as delivered", args.id);
            Ok(())
        }
        OrdersCommands::Cancel(args) => {
            let mut view =
                CustomerOrdersView::new(context.view_context(), context.order_service(), actor);
            view.refresh().await.context("failed to fetch orders")?;
            let draft = view
                .open_cancellation(&args.id)
                .await?
                .with_reason(args.reason)
                .with_description(args.description);
            view.submit_cancellation(draft)
                .await
                .map_err(ServiceError::from)
                .with_context(|| format!("failed to request cancellation of {}", args.id))?;
            println!("Cancellation requested for order {}", args.id);
            Ok(())
        }
        OrdersCommands::Stats => {
            if !actor.is_admin() {
                return Err(ServiceError::Forbidden(
                    "Only admins can view order statistics".to_string(),
                )
                .into());
            }
            let mut view =
                AdminOrdersView::new(context.view_context(), context.order_service(), actor);
            view.refresh().await.context("failed to fetch orders")?;
            let stats = view.stats();
            if json {
                print_json(&stats)?;
            } else {
                println!(
                    "Orders {} • pending {} • accepted {} • delivered {} • open requests {} • accepted revenue {} {}",
                    stats.total,
                    stats.pending,
                    stats.accepted,
                    stats.delivered,
                    stats.open_requests,
                    stats.accepted_revenue,
                    context.config.currency
                );
            }
            Ok(())
        }
    }
}

async fn fetch_order(context: &CliContext, actor: &Actor, id: &str) -> Result<Order> {
    let orders = match actor {
        Actor::Customer { .. } => context.api.my_orders().await,
        _ => context.api.all_orders().await,
    }
    .context("failed to fetch orders")?;
    orders
        .into_iter()
        .find(|order| order.id == id)
        .ok_or_else(|| anyhow!("order {} not found", id))
}

async fn handle_returns_command(
    context: &mut CliContext,
    command: ReturnsCommands,
    json: bool,
) -> Result<()> {
    let actor = context.actor()?;
    match command {
        ReturnsCommands::Request(args) => {
            let mut view =
                CustomerOrdersView::new(context.view_context(), context.order_service(), actor);
            view.refresh().await.context("failed to fetch orders")?;
            view.open_detail(&args.target.order)?;
            let draft = view
                .open_return(&args.target.order, &args.target.item)
                .await?
                .with_kind(args.kind.into())
                .with_reason(args.reason)
                .with_comments(args.comments);
            view.submit_return(draft)
                .await
                .map_err(ServiceError::from)
                .context("failed to submit request")?;
            if let Some(order) = view.detail() {
                if json {
                    print_json(order)?;
                } else {
                    render_order(order);
                }
            }
            Ok(())
        }
        ReturnsCommands::Handover(args) => {
            let mut view =
                CustomerOrdersView::new(context.view_context(), context.order_service(), actor);
            view.refresh().await.context("failed to fetch orders")?;
            view.confirm_handover(&args.order, &args.item)
                .await
                .context("failed to confirm handover")?;
            println!("Handover confirmed for item {}", args.item);
            Ok(())
        }
        ReturnsCommands::List(args) => {
            if !actor.is_admin() {
                bail!("only admins can list return requests");
            }
            let rows = ReturnRequestsQuery {
                only_open: args.open,
            }
            .execute(context.api.as_ref())
            .await
            .context("failed to fetch return requests")?;
            if json {
                return print_json(&rows);
            }
            println!("{} request(s)", rows.len());
            for row in rows {
                println!(
                    "- Order {} • item {} ({}) • {} • {}",
                    row.order_id,
                    row.item_id,
                    row.name,
                    row.status.label(),
                    row.reason.as_deref().unwrap_or("-")
                );
                if let Some(refund) = row.refund {
                    println!("    refunded {} {}", refund.amount, context.config.currency);
                }
            }
            Ok(())
        }
    }
}

async fn handle_coupons_command(
    context: &mut CliContext,
    command: CouponsCommands,
    json: bool,
) -> Result<()> {
    if let CouponsCommands::Applicable = command {
        let subtotals = context.state.cart.vendor_subtotals();
        let coupons = context
            .coupon_service()
            .applicable_for(&subtotals, Utc::now().date_naive())
            .await
            .context("failed to fetch active coupons")?;
        if json {
            return print_json(&coupons);
        }
        for coupon in coupons {
            println!("- {} saves {}", coupon.offer.code, coupon.discount);
        }
        return Ok(());
    }

    match context.actor()? {
        Actor::Admin => {
            let mut view = AdminCouponsView::new(context.view_context(), Actor::Admin);
            view.refresh().await.context("failed to fetch offers")?;
            match command {
                CouponsCommands::List => {
                    let reviews = view.reviews();
                    if json {
                        return print_json(&reviews);
                    }
                    println!("Max discount {}%", view.settings().max_discount.normalize());
                    for row in reviews {
                        println!(
                            "- Offer {} • {} • {}{}",
                            row.offer_id,
                            row.code,
                            row.status,
                            if row.excessive { " • Excessive" } else { "" }
                        );
                    }
                }
                CouponsCommands::Approve(args) => view
                    .approve(&args.id)
                    .await
                    .with_context(|| format!("failed to approve offer {}", args.id))?,
                CouponsCommands::Reject(args) => view
                    .reject(&args.id, &args.reason)
                    .await
                    .with_context(|| format!("failed to reject offer {}", args.id))?,
                CouponsCommands::MaxDiscount(args) => view
                    .set_max_discount(args.value)
                    .await
                    .context("failed to update max discount")?,
                _ => bail!("this coupon command is for vendors"),
            }
            Ok(())
        }
        Actor::Vendor { vendor_id } => {
            let mut view = VendorOffersView::new(context.view_context(), vendor_id);
            view.refresh().await.context("failed to fetch offers")?;
            match command {
                CouponsCommands::List => {
                    if json {
                        return print_json(&view.offers());
                    }
                    view.offers().iter().for_each(render_offer);
                }
                CouponsCommands::Create(args) => {
                    let draft = OfferDraft {
                        code: args.code,
                        kind: args.kind.into(),
                        value: args.value,
                        min_order: args.min_order,
                        valid_from: args.valid_from,
                        valid_until: args.valid_until,
                        description: args.description,
                    };
                    let created = view.create(&draft).await.context("failed to create offer")?;
                    if json {
                        print_json(&created)?;
                    } else {
                        render_offer(&created);
                    }
                }
                CouponsCommands::Toggle(args) => {
                    let status = view
                        .toggle(&args.id)
                        .await
                        .with_context(|| format!("failed to toggle offer {}", args.id))?;
                    println!("Offer {} is now {}", args.id, status);
                }
                _ => bail!("this coupon command is for admins"),
            }
            Ok(())
        }
        Actor::Customer { .. } => {
            bail!("customers can only list applicable coupons (`coupons applicable`)")
        }
    }
}

async fn handle_cart_command(
    context: &mut CliContext,
    command: CartCommands,
    json: bool,
) -> Result<()> {
    let api = context.api.clone();
    match command {
        CartCommands::List => {
            let cart = &context.state.cart;
            if json {
                return print_json(&cart.items());
            }
            for item in cart.items() {
                render_cart_item(item);
            }
            println!(
                "{} item(s) • subtotal {} {}",
                cart.item_count(),
                cart.subtotal(),
                context.config.currency
            );
            return Ok(());
        }
        CartCommands::Add(args) => {
            let product = api
                .get_product(&args.product)
                .await
                .with_context(|| format!("failed to fetch product {}", args.product))?;
            context
                .state
                .cart
                .add(CartItem::from_product(&product, args.qty))?;
        }
        CartCommands::Remove(args) => context.state.cart.remove(&args.product)?,
        CartCommands::Clear => context.state.cart.clear()?,
        CartCommands::Checkout(args) => {
            let order = checkout(context, args).await?;
            if json {
                print_json(&order)?;
            } else {
                render_order(&order);
            }
        }
    }
    context
        .state
        .sync_to_profile(api.as_ref())
        .await
        .context("failed to sync cart with profile")?;
    Ok(())
}

async fn checkout(context: &mut CliContext, args: CheckoutArgs) -> Result<Order> {
    context.state.auth.require()?;
    let api = context.api.clone();
    let addresses = &mut context.state.addresses;
    addresses
        .refresh(api.as_ref())
        .await
        .context("failed to fetch addresses")?;
    if let Some(id) = &args.address {
        addresses.select(id)?;
    }
    let shipping_address = addresses.selected_snapshot()?;

    let today = Utc::now().date_naive();
    let coupon: Option<VendorOffer> = match &args.coupon {
        Some(code) => {
            let code = code.trim().to_uppercase();
            let applicable = context
                .coupon_service()
                .applicable_for(&context.state.cart.vendor_subtotals(), today)
                .await
                .context("failed to fetch active coupons")?;
            let found = applicable
                .into_iter()
                .find(|c| c.offer.code == code)
                .ok_or_else(|| anyhow!("coupon {} does not apply to this cart", code))?;
            Some(found.offer)
        }
        None => None,
    };

    let service = context.order_service();
    let new_order = service.prepare_order(Checkout {
        items: context.state.cart.items(),
        shipping_address,
        payment_method: args.payment.into(),
        coupon: coupon.as_ref(),
        today,
    })?;
    let order = service
        .place_order(&new_order)
        .await
        .context("failed to place order")?;
    context.state.cart.clear()?;
    Ok(order)
}

async fn handle_addresses_command(
    context: &mut CliContext,
    command: AddressesCommands,
    json: bool,
) -> Result<()> {
    context.state.auth.require()?;
    let api = context.api.clone();
    let book = &mut context.state.addresses;
    book.refresh(api.as_ref())
        .await
        .context("failed to fetch addresses")?;
    match command {
        AddressesCommands::List => {
            if json {
                return print_json(&book.addresses());
            }
            let selected = book.selected_address().and_then(|a| a.id.clone());
            for address in book.addresses() {
                let marker = if address.id == selected { "*" } else { "-" };
                println!(
                    "{} {} • {}",
                    marker,
                    address.id.as_deref().unwrap_or("?"),
                    address.snapshot().one_line()
                );
            }
        }
        AddressesCommands::Add(args) => {
            let saved = book
                .add(
                    api.as_ref(),
                    NewAddress {
                        address: args.address,
                        city: args.city,
                        pincode: args.pincode,
                        phone: args.phone,
                        country: args.country,
                        is_default: args.default,
                    },
                )
                .await
                .context("failed to save address")?;
            if json {
                print_json(&saved)?;
            } else {
                println!("Saved address {}", saved.id.as_deref().unwrap_or("?"));
            }
        }
        AddressesCommands::Delete(args) => {
            book.delete(api.as_ref(), &args.id)
                .await
                .with_context(|| format!("failed to delete address {}", args.id))?;
            println!("Deleted address {}", args.id);
        }
    }
    Ok(())
}

async fn handle_products_command(
    context: &CliContext,
    command: ProductsCommands,
    json: bool,
) -> Result<()> {
    match command {
        ProductsCommands::List => {
            let products = context
                .api
                .list_products()
                .await
                .context("failed to fetch products")?;
            if json {
                return print_json(&products);
            }
            for product in &products {
                render_product(product, &context.config.currency);
            }
        }
        ProductsCommands::Show(args) => {
            let product = context
                .api
                .get_product(&args.id)
                .await
                .with_context(|| format!("failed to fetch product {}", args.id))?;
            if json {
                return print_json(&product);
            }
            render_product(&product, &context.config.currency);
            if let Some(description) = &product.description {
                println!("  {}", description);
            }
        }
    }
    Ok(())
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim()).map_err(|e| format!("invalid decimal '{}': {}", raw, e))
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {}", raw, e))
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, String> {
    OrderStatus::from_str(raw.trim()).map_err(|_| format!("unknown order status '{}'", raw))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_summaries(summaries: &[OrderSummary], json: bool) -> Result<()> {
    if json {
        return print_json(summaries);
    }
    println!("Orders {} result(s)", summaries.len());
    for summary in summaries {
        println!(
            "- Order {} • {} • {} • {} item(s) • total {} • {}{}",
            summary.id,
            summary.status,
            summary.badge,
            summary.item_count,
            summary.total_price,
            summary.payment_method,
            if summary.open_requests > 0 {
                format!(" • {} open request(s)", summary.open_requests)
            } else {
                String::new()
            }
        );
    }
    Ok(())
}

fn render_order(order: &Order) {
    println!(
        "- Order {} • {} • {} • paid via {}",
        order.id,
        order.order_status,
        order.acceptance().badge(),
        order.payment_method
    );
    println!("  ship to {}", order.shipping_address.one_line());
    for item in &order.order_items {
        println!(
            "  • {} {} x {} @ {} [{}]",
            item.id,
            item.quantity,
            item.name,
            item.price,
            item.return_status().label()
        );
    }
    println!(
        "  items {} + tax {} + shipping {} = {}",
        order.items_price, order.tax_price, order.shipping_price, order.total_price
    );
}

fn render_cart_item(item: &CartItem) {
    println!(
        "  • {} x {} ({}) @ {} = {}",
        item.qty,
        item.name,
        item.product,
        item.price,
        item.line_total()
    );
}

fn render_offer(offer: &VendorOffer) {
    println!(
        "- Offer {} • {} • {} {} • {} to {} • {}",
        offer.id,
        offer.code,
        offer.kind,
        offer.value,
        offer.valid_from,
        offer.valid_until,
        offer.status
    );
    if let Some(reason) = &offer.rejection_reason {
        println!("  rejected: {}", reason);
    }
}

fn render_product(product: &Product, currency: &str) {
    println!(
        "- Product {} • {} • {} {} • stock {}",
        product.id, product.name, product.price, currency, product.count_in_stock
    );
}
